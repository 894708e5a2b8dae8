//! Test doubles shared by the service tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::service::processing::{ChannelError, PayloadChannel};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Received(Vec<u8>),
    Sent(Vec<u8>),
    SentText(String),
    Closed(u16),
}

/// Scripted channel recording every interaction
///
/// Once the script runs out the peer either hangs up or, when held open,
/// stays silent forever.
pub struct MockChannel {
    pub inbound: VecDeque<Result<Option<Vec<u8>>, ChannelError>>,
    pub events: Arc<Mutex<Vec<Event>>>,
    hold_open: bool,
}

impl MockChannel {
    pub fn new(payloads: &[&[u8]]) -> Self {
        Self {
            inbound: payloads.iter().map(|p| Ok(Some(p.to_vec()))).collect(),
            events: Arc::default(),
            hold_open: false,
        }
    }

    pub fn held_open(payloads: &[&[u8]]) -> Self {
        Self {
            hold_open: true,
            ..Self::new(payloads)
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl PayloadChannel for MockChannel {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        let next = match self.inbound.pop_front() {
            Some(next) => next,
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        };
        if let Ok(Some(payload)) = &next {
            self.events.lock().unwrap().push(Event::Received(payload.clone()));
        }
        next
    }

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), ChannelError> {
        self.events.lock().unwrap().push(Event::Sent(payload));
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.events.lock().unwrap().push(Event::SentText(text));
        Ok(())
    }

    async fn close(&mut self, code: u16, _reason: &str) -> Result<(), ChannelError> {
        self.events.lock().unwrap().push(Event::Closed(code));
        Ok(())
    }
}
