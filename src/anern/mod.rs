pub mod checksum;
pub mod grammar;
pub mod inverter;
pub mod packet;
