#![allow(dead_code)]

use anern_monitor::anern::checksum::checksum;
use anern_monitor::anern::inverter::ChecksumPolicy;
use anern_monitor::error::{Error, Result};
use anern_monitor::prelude::{Inverter, Transport};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const STATUS_BODY: &str = "230.0 50.0 230.0 50.0 0800 0800 020 360 52.50 010 100 0045 02.1 150.0 53.00 00000 00000000 00 00 00100 000";

pub const RATINGS_BODY: &str = "230.0 21.7 230.0 50.0 21.7 5000 4000 48.0 46.0 42.0 56.4 54.0 2 02 060 0 2 3 9 01 0 0 54.0 0 1";

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Write(Vec<u8>),
    Read,
}

/// Transport that records what was written and answers reads from a script.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    pub events: Arc<Mutex<Vec<Event>>>,
    replies: Arc<Mutex<VecDeque<Option<Vec<u8>>>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply; `None` makes the read time out.
    pub fn reply(&self, reply: Option<Vec<u8>>) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, frame: &[u8]) -> Result<()> {
        self.events.lock().unwrap().push(Event::Write(frame.to_vec()));
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>> {
        self.events.lock().unwrap().push(Event::Read);
        match self.replies.lock().unwrap().pop_front() {
            Some(Some(reply)) => Ok(reply),
            _ => Err(Error::Timeout),
        }
    }
}

pub struct Factory();
impl Factory {
    /// A well-formed response frame carrying `body`.
    pub fn response(body: &str) -> Vec<u8> {
        let mut frame = vec![b'('];
        frame.extend_from_slice(body.as_bytes());
        frame.extend_from_slice(&checksum(body.as_bytes()));
        frame.push(b'\r');
        frame
    }

    pub fn status_response() -> Vec<u8> {
        Self::response(STATUS_BODY)
    }

    pub fn ratings_response() -> Vec<u8> {
        Self::response(RATINGS_BODY)
    }

    pub fn inverter(transport: &ScriptedTransport) -> Inverter<ScriptedTransport> {
        Inverter::new(transport.clone()).with_settle(Duration::ZERO)
    }

    pub fn strict_inverter(transport: &ScriptedTransport) -> Inverter<ScriptedTransport> {
        Self::inverter(transport).with_checksum_policy(ChecksumPolicy::Enforce)
    }
}
