//! # Polling Config
//!
//! [`PollingConfig`] reloads a wrapped node on a [`Scheduler`].
//!
//! The first successful `load` registers the reload task; later calls only
//! load. Each tick reloads the wrapped node and then fires `updated`, even
//! when the reload failed, so listeners re-read what is visible. Failures
//! and panicking listeners are logged and never stop later ticks. A tick
//! that finds the previous one still running is skipped.

use crate::Result;
use crate::decoder::Cast;
use crate::event::{EventHandler, Relay};
use crate::interpolation::StrLookup;
use crate::node::ConfigNode;
use crate::scheduler::{FixedIntervalScheduler, Scheduler, Task};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use strata_core::{ConfigMap, Value};
use tracing::{debug, info, warn};

pub struct PollingConfig {
    me: Weak<PollingConfig>,
    config: Arc<dyn ConfigNode>,
    scheduler: Arc<dyn Scheduler>,
    scheduled: AtomicBool,
    reloading: Mutex<()>,
    updated: Relay,
}

impl fmt::Debug for PollingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingConfig")
            .field("config", &self.config.describe())
            .field("scheduled", &self.scheduled.load(Ordering::Relaxed))
            .finish()
    }
}

impl PollingConfig {
    /// Reload `config` with a fixed delay of `interval` between reloads.
    ///
    /// Ticks run on the tokio runtime current at the first `load`.
    pub fn new(config: Arc<dyn ConfigNode>, interval: Duration) -> Result<Arc<Self>> {
        let scheduler = FixedIntervalScheduler::new(interval)?;
        Ok(Self::with_scheduler(config, Arc::new(scheduler)))
    }

    pub fn with_scheduler(config: Arc<dyn ConfigNode>, scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let wrapper: Weak<dyn ConfigNode> = me.clone();
            Self {
                me: me.clone(),
                updated: Relay::new(config.clone(), wrapper),
                config,
                scheduler,
                scheduled: AtomicBool::new(false),
                reloading: Mutex::new(()),
            }
        })
    }

    pub fn config(&self) -> &Arc<dyn ConfigNode> {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Whether the reload task has been registered.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    fn reload(&self) {
        let Some(_guard) = self.reloading.try_lock() else {
            debug!(config = %self.config.describe(), "Reload already running, skipping tick");
            return;
        };

        if let Err(e) = self.config.load() {
            warn!(
                config = %self.config.describe(),
                error = %e,
                "Unable to reload config, keeping previous data"
            );
        }

        let notified = panic::catch_unwind(AssertUnwindSafe(|| self.updated().invoke(&())));
        if notified.is_err() {
            warn!(config = %self.config.describe(), "Updated listener panicked");
        }
    }
}

impl ConfigNode for PollingConfig {
    fn get_raw(&self, key: &str) -> Option<Value> {
        self.config.get_raw(key)
    }

    fn get_value(&self, key: &str, cast: Option<&Cast>) -> Result<Option<Value>> {
        self.config.get_value(key, cast)
    }

    /// Load the wrapped node now; errors propagate. Starts the reload task
    /// after the first success.
    fn load(&self) -> Result<()> {
        self.config.load()?;

        if self.scheduled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let me = self.me.clone();
        let task: Task = Arc::new(move || {
            if let Some(me) = me.upgrade() {
                me.reload();
            }
        });
        if let Err(e) = self.scheduler.schedule(task) {
            self.scheduled.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        info!(config = %self.config.describe(), "Scheduled config reload");
        Ok(())
    }

    fn updated(&self) -> &EventHandler {
        self.updated.handler()
    }

    fn lookup(&self) -> Option<Arc<dyn StrLookup>> {
        self.config.lookup()
    }

    fn set_lookup(&self, lookup: Option<Arc<dyn StrLookup>>) {
        self.config.set_lookup(lookup);
    }

    fn raw_map(&self) -> ConfigMap {
        self.config.raw_map()
    }

    fn describe(&self) -> String {
        format!("{} (polled)", self.config.describe())
    }
}

impl Drop for PollingConfig {
    fn drop(&mut self) {
        self.scheduler.close();
    }
}
