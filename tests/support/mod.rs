#![allow(dead_code)]

pub mod invoice;
pub mod mock;
pub mod port;
pub mod wait;
