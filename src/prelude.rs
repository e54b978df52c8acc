pub use anyhow::{anyhow, bail, Context, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::io::Write;

pub use crate::anern::inverter::{Inverter, SerialTransport, Transport};
pub use crate::anern::packet::{Command, Response};
pub use crate::config::{self, Config};
pub use crate::options::Options;
