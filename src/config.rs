//! JSON deployment configuration: describes a set of queues, publishers, and
//! subscribers declaratively so a whole topology can be stood up from one
//! file (spec.md §4.7), mirroring the reference package's deployment-config
//! idiom.
//!
//! ```json
//! {
//!   "queues": {
//!     "/var/run/myapp/events": {
//!       "subscribers": ["worker-a", "worker-b"],
//!       "max_msgs_num": 4096
//!     }
//!   },
//!   "pub": {
//!     "producer": { "out_queue": "/var/run/myapp/events", "subscribers": ["worker-a", "worker-b"] }
//!   },
//!   "sub": {
//!     "worker-a": { "in_queue": "/var/run/myapp/events" }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::control::ControlPlane;
use crate::engine::VacuumReport;
use crate::error::{Error, Result};
use crate::pubsub::{Publisher, Subscriber};
use crate::schema::{
    self, HighWaterMark, Strategy, DEFAULT_HWM_DB_SIZE_BYTES, DEFAULT_MAX_DB_NUM,
    DEFAULT_MAX_DB_SIZE_BYTES, DEFAULT_MAX_MSGS_NUM, DEFAULT_MAX_READER_NUM,
    DEFAULT_MSG_TIMEOUT_SECS,
};
use crate::store::StoreConfig;

/// One queue directory's deployment parameters, as declared under
/// `queues.<path>` in the config file. Every field has a default drawn from
/// `schema`'s constants, so a deployment file only needs to spell out what
/// it wants to override.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueSettings {
    pub subscribers: Vec<String>,
    pub max_reader_num: u32,
    pub max_db_num: u32,
    pub max_db_size_bytes: u64,
    pub msg_timeout_secs: u64,
    pub max_msgs_num: u64,
    pub hwm_db_size_bytes: u64,
    pub strategy: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            subscribers: Vec::new(),
            max_reader_num: DEFAULT_MAX_READER_NUM,
            max_db_num: DEFAULT_MAX_DB_NUM,
            max_db_size_bytes: DEFAULT_MAX_DB_SIZE_BYTES,
            msg_timeout_secs: DEFAULT_MSG_TIMEOUT_SECS,
            max_msgs_num: DEFAULT_MAX_MSGS_NUM,
            hwm_db_size_bytes: DEFAULT_HWM_DB_SIZE_BYTES,
            strategy: Strategy::PRUNE_FIRST.to_string(),
        }
    }
}

impl QueueSettings {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_dbs: self.max_db_num,
            max_readers: self.max_reader_num,
            map_size_bytes: self.max_db_size_bytes as usize,
        }
    }

    fn high_water_mark(&self) -> HighWaterMark {
        HighWaterMark {
            msg_timeout_secs: self.msg_timeout_secs,
            max_msgs_num: self.max_msgs_num,
            hwm_db_size_bytes: self.hwm_db_size_bytes,
        }
    }

    fn strategy(&self) -> Result<Strategy> {
        Strategy::parse(&self.strategy)
    }
}

/// One entry under `pub.<id>`: the queue a named publisher writes into and
/// the subscriber set it broadcasts to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherSettings {
    pub out_queue: PathBuf,
    #[serde(default)]
    pub subscribers: Vec<String>,
}

/// One entry under `sub.<id>`: the queue a named subscriber reads from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriberSettings {
    pub in_queue: PathBuf,
    #[serde(default)]
    pub strict: bool,
}

/// A whole deployment: queue topologies plus the publisher/subscriber
/// identities layered on top of them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub queues: BTreeMap<PathBuf, QueueSettings>,
    #[serde(rename = "pub", default)]
    pub publishers: HashMap<String, PublisherSettings>,
    #[serde(rename = "sub", default)]
    pub subscribers: HashMap<String, SubscriberSettings>,
}

impl DeploymentConfig {
    /// Parses a deployment file from its JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| Error::Config(err.to_string()))
    }

    /// Reads and parses a deployment file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Initializes every declared queue (creating its directory and
    /// sub-databases, writing its parameter records) via the Control Plane.
    /// Idempotent, like `ControlPlane::initialize` itself.
    pub fn deploy(&self) -> Result<()> {
        for (path, settings) in &self.queues {
            let env = crate::registry::open(path, settings.store_config())?;
            let control = ControlPlane::new(env);
            let subscriber_refs: Vec<&str> = settings.subscribers.iter().map(String::as_str).collect();
            control.initialize(&subscriber_refs, settings.high_water_mark(), settings.strategy()?)?;
            log::info!("deployed queue at {}", path.display());
        }
        Ok(())
    }

    /// Runs dangling-reclamation vacuum (spec.md §4.4
    /// `prune_dangling_messages`) against every queue this config declares,
    /// the config-driven form the CLI's `prune-dangling <config>` requires
    /// (spec.md §6). Reports are summed across queues.
    pub fn prune_dangling(&self) -> Result<VacuumReport> {
        let mut total = VacuumReport::default();
        for (path, settings) in &self.queues {
            let env = crate::registry::open(path, settings.store_config())?;
            let report = ControlPlane::new(env).prune_dangling_messages()?;
            log::info!(
                "vacuum at {}: reclaimed {}, pruned {}",
                path.display(),
                report.reclaimed,
                report.pruned
            );
            total.reclaimed += report.reclaimed;
            total.pruned += report.pruned;
        }
        Ok(total)
    }

    /// Empties every subscriber's undelivered-message set for every queue
    /// this config declares (spec.md §4.4 `clear_all_subscribers`), the
    /// config-driven form the CLI's `clear-all <config>` requires (spec.md
    /// §6).
    pub fn clear_all(&self) -> Result<()> {
        for (path, settings) in &self.queues {
            let env = crate::registry::open(path, settings.store_config())?;
            ControlPlane::new(env).clear_all_subscribers()?;
            log::info!("cleared all subscriber state for {}", path.display());
        }
        Ok(())
    }

    /// Opens the named publisher declared under `pub.<publisher_id>`,
    /// against its `out_queue`'s settings (falling back to defaults if that
    /// queue was not separately declared under `queues`).
    pub fn open_publisher(&self, publisher_id: &str) -> Result<Publisher> {
        let settings = self
            .publishers
            .get(publisher_id)
            .ok_or_else(|| Error::Config(format!("no publisher named {publisher_id:?}")))?;
        let store_config = self
            .queues
            .get(&settings.out_queue)
            .map(QueueSettings::store_config)
            .unwrap_or_else(StoreConfig::default);
        let env = crate::registry::open(&settings.out_queue, store_config)?;
        Ok(Publisher::new(env, settings.subscribers.clone()))
    }

    /// Opens the named subscriber declared under `sub.<subscriber_id>`.
    pub fn open_subscriber(&self, subscriber_id: &str) -> Result<Subscriber> {
        let settings = self
            .subscribers
            .get(subscriber_id)
            .ok_or_else(|| Error::Config(format!("no subscriber named {subscriber_id:?}")))?;
        let store_config = self
            .queues
            .get(&settings.in_queue)
            .map(QueueSettings::store_config)
            .unwrap_or_else(StoreConfig::default);
        let env = crate::registry::open(&settings.in_queue, store_config)?;
        Ok(Subscriber::new(env, subscriber_id.to_string()).with_strict_mode(settings.strict))
    }
}
