//! Request/response demo clients
//!
//! `KlasseB` listens for `NachrichtVonA` and answers with a `NachrichtVonB`,
//! which `KlasseA` listens for. Both only hold the bus; the bus only holds
//! them weakly.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use log::info;
use crate::error::Result;
use crate::weakbus::bus::{Delivery, MessageBus};
use crate::weakbus::types::HandlerResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NachrichtVonA {
    pub text: String,
    pub zahl: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NachrichtVonB {
    pub erfolg: bool,
    pub zeitstempel: SystemTime,
}

pub struct KlasseA {
    bus: Arc<MessageBus>,
    received: Mutex<Vec<NachrichtVonB>>,
}

impl KlasseA {
    pub fn new(bus: Arc<MessageBus>) -> Arc<Self> {
        let a = Arc::new(Self {
            bus: bus.clone(),
            received: Mutex::new(Vec::new()),
        });
        bus.subscribe_bound(&a, Self::on_nachricht_von_b);
        a
    }

    /// Sendet die Anfrage an alle Abonnenten von `NachrichtVonA`
    pub fn start(&self) -> Result<Delivery> {
        self.bus.publish(&NachrichtVonA {
            text: "Hallo von A".to_string(),
            zahl: 123,
        })
    }

    pub fn received(&self) -> Vec<NachrichtVonB> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn on_nachricht_von_b(&self, msg: &NachrichtVonB) -> HandlerResult {
        info!("A empfängt: Erfolg={}, Zeit={:?}", msg.erfolg, msg.zeitstempel);
        self.received
            .lock()
            .map_err(|_| "KlasseA state poisoned")?
            .push(msg.clone());
        Ok(())
    }
}

pub struct KlasseB {
    bus: Arc<MessageBus>,
    received: Mutex<Vec<NachrichtVonA>>,
}

impl KlasseB {
    pub fn new(bus: Arc<MessageBus>) -> Arc<Self> {
        let b = Arc::new(Self {
            bus: bus.clone(),
            received: Mutex::new(Vec::new()),
        });
        bus.subscribe_bound(&b, Self::on_nachricht_von_a);
        b
    }

    pub fn received(&self) -> Vec<NachrichtVonA> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn on_nachricht_von_a(&self, msg: &NachrichtVonA) -> HandlerResult {
        info!("B empfängt: Text='{}', Zahl={}", msg.text, msg.zahl);
        self.received
            .lock()
            .map_err(|_| "KlasseB state poisoned")?
            .push(msg.clone());

        // Antwort synchron zurück an A
        self.bus.publish(&NachrichtVonB {
            erfolg: true,
            zeitstempel: SystemTime::now(),
        })?;
        Ok(())
    }
}
