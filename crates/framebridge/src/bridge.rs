//! The bridge context.
//!
//! [`Bridge::start`] spawns the worker, hands it the engine and waits for
//! `ready` before returning, so a `Bridge` value always has a ready worker
//! behind it.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use framebridge_engine::{Engine, PolarsEngine};
use framebridge_types::ReadOptions;

use crate::channel::{ChannelStats, channel};
use crate::config::BridgeConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{BridgeError, BridgeResult};
use crate::io::{self, CsvSource};
use crate::protocol::{RequestBody, ResponseBody, tags};
use crate::proxy::FrameProxy;
use crate::spawn::{WorkerThread, spawn_worker};

/// A running bridge to one worker.
pub struct Bridge {
    config: BridgeConfig,
    dispatcher: Arc<Dispatcher>,
    worker: WorkerThread,
    http: reqwest::Client,
}

impl Bridge {
    /// Spawn a worker, move `engine` into it and wait until it is ready.
    pub async fn start(config: BridgeConfig, engine: impl Engine) -> BridgeResult<Self> {
        let http = io::http_client(&config)?;
        let engine_name = engine.name().to_string();

        let (control, worker_port) = channel();
        let worker = spawn_worker(config.worker.name.clone(), worker_port)?;
        let dispatcher = Arc::new(Dispatcher::new(control, config.request_timeout()));

        let body = RequestBody::Start {
            engine: Box::new(engine),
            config: config.engine_config(),
        };
        match dispatcher.call(body).await? {
            ResponseBody::Ready => {}
            other => {
                return Err(BridgeError::UnexpectedResponse {
                    expected: tags::READY,
                    got: other.tag(),
                });
            }
        }

        info!(
            "[bridge] Worker {} ready with engine {}",
            config.worker.name, engine_name
        );
        Ok(Self {
            config,
            dispatcher,
            worker,
            http,
        })
    }

    /// Start a bridge backed by the polars engine.
    pub async fn start_polars(config: BridgeConfig) -> BridgeResult<Self> {
        Self::start(config, PolarsEngine::new()).await
    }

    /// Read a CSV source into a new frame in the worker.
    ///
    /// `options` are layered over the configured read defaults. URL sources
    /// are validated before anything is fetched or sent.
    pub async fn read_csv(
        &self,
        source: impl Into<CsvSource>,
        options: ReadOptions,
    ) -> BridgeResult<FrameProxy> {
        let buf = source.into().into_bytes(&self.http).await?;
        let options = self.config.read_defaults().merge(&options);
        debug!("[bridge] read_csv {} bytes", buf.len());

        match self.dispatcher.call(RequestBody::ReadCsv { options, buf }).await? {
            ResponseBody::ReadCsv { ptr } => Ok(FrameProxy::wrap(ptr, self.dispatcher.clone())),
            other => Err(BridgeError::UnexpectedResponse {
                expected: tags::READ_CSV,
                got: other.tag(),
            }),
        }
    }

    /// Read several sources concurrently with the same options.
    ///
    /// Every source is validated before the first fetch, so one bad URL
    /// fails the whole batch without any traffic.
    pub async fn read_csv_many<I, S>(
        &self,
        sources: I,
        options: ReadOptions,
    ) -> BridgeResult<Vec<FrameProxy>>
    where
        I: IntoIterator<Item = S>,
        S: Into<CsvSource>,
    {
        let sources: Vec<CsvSource> = sources.into_iter().map(Into::into).collect();
        for source in &sources {
            source.validate()?;
        }
        try_join_all(
            sources
                .into_iter()
                .map(|source| self.read_csv(source, options.clone())),
        )
        .await
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        self.dispatcher.stats()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_worker_alive()
    }

    /// Stop the worker and wait for its thread to exit.
    ///
    /// Proxies that outlive the bridge become inert; their operations fail
    /// with [`BridgeError::WorkerExited`].
    pub async fn shutdown(self) -> BridgeResult<()> {
        let Self {
            config,
            dispatcher,
            worker,
            ..
        } = self;

        match dispatcher.call(RequestBody::Shutdown).await? {
            ResponseBody::Stopped => {}
            other => {
                return Err(BridgeError::UnexpectedResponse {
                    expected: tags::STOPPED,
                    got: other.tag(),
                });
            }
        }

        tokio::task::spawn_blocking(move || worker.join())
            .await
            .map_err(|_| BridgeError::WorkerPanicked)??;

        info!("[bridge] Worker {} stopped", config.worker.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use framebridge_engine::{EngineConfig, EngineError, EngineResult};
    use framebridge_types::{CsvReadConfig, Handle, PlanOp, Shape, all, col};
    use parking_lot::Mutex;

    use crate::channel::Direction;

    const CSV: &[u8] = b"id,name,score\n1,ada,9.5\n2,,7.0\n3,grace,\n4,linus,3.25\n";

    /// Wraps the polars engine and records the address of every buffer it
    /// is handed.
    struct RecordingEngine {
        inner: PolarsEngine,
        seen: Arc<Mutex<Vec<usize>>>,
        fail_init: bool,
    }

    impl RecordingEngine {
        fn new(seen: Arc<Mutex<Vec<usize>>>) -> Self {
            Self {
                inner: PolarsEngine::new(),
                seen,
                fail_init: false,
            }
        }
    }

    impl Engine for RecordingEngine {
        fn name(&self) -> &str {
            "recording"
        }
        fn init(&mut self, config: &EngineConfig) -> EngineResult<()> {
            if self.fail_init {
                return Err(EngineError::Other("refusing to start".into()));
            }
            self.inner.init(config)
        }
        fn read_csv(&mut self, buf: Bytes, options: &CsvReadConfig) -> EngineResult<Handle> {
            self.seen.lock().push(buf.as_ptr() as usize);
            self.inner.read_csv(buf, options)
        }
        fn collect(&mut self, source: Handle, plan: &[PlanOp]) -> EngineResult<Handle> {
            self.inner.collect(source, plan)
        }
        fn shape(&self, frame: Handle) -> EngineResult<Shape> {
            self.inner.shape(frame)
        }
        fn columns(&self, frame: Handle) -> EngineResult<Vec<String>> {
            self.inner.columns(frame)
        }
        fn release(&mut self, handle: Handle) -> bool {
            self.inner.release(handle)
        }
        fn live_objects(&self) -> usize {
            self.inner.live_objects()
        }
    }

    #[tokio::test]
    async fn test_start_waits_for_ready() {
        let bridge = Bridge::start_polars(BridgeConfig::default()).await.unwrap();
        assert!(bridge.is_running());

        let stats = bridge.stats();
        assert_eq!(stats.count(Direction::Outbound, tags::START), 1);
        assert_eq!(stats.count(Direction::Inbound, tags::READY), 1);
        assert_eq!(stats.count(Direction::Inbound, tags::READ_CSV), 0);
        assert_eq!(stats.total(Direction::Inbound), 1);

        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_and_collect_round_trip() {
        let bridge = Bridge::start_polars(BridgeConfig::default()).await.unwrap();

        let frame = bridge.read_csv(CSV, ReadOptions::default()).await.unwrap();
        assert_eq!(frame.shape().await.unwrap(), Shape::new(4, 3));

        let collected = frame.lazy().select([all()]).collect().await.unwrap();
        assert_eq!(collected.shape().await.unwrap(), Shape::new(4, 3));
        assert_eq!(collected.columns().await.unwrap(), vec!["id", "name", "score"]);

        let stats = bridge.stats();
        assert_eq!(stats.count(Direction::Outbound, tags::COLLECT), 1);
        assert_eq!(stats.count(Direction::Inbound, tags::COLLECT), 1);

        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_buffer_reaches_engine_without_copy() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bridge = Bridge::start(BridgeConfig::default(), RecordingEngine::new(seen.clone()))
            .await
            .unwrap();

        let buf = Bytes::from(CSV.to_vec());
        let addr = buf.as_ptr() as usize;
        let frame = bridge.read_csv(buf, ReadOptions::default()).await.unwrap();
        assert_eq!(frame.shape().await.unwrap().height, 4);
        assert_eq!(*seen.lock(), vec![addr]);

        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_urls_send_nothing() {
        let bridge = Bridge::start_polars(BridgeConfig::default()).await.unwrap();
        let before = bridge.stats().total(Direction::Outbound);

        for input in ["ftp://host/data.csv", "not a url"] {
            let err = bridge.read_csv(input, ReadOptions::default()).await.unwrap_err();
            assert!(err.is_configuration_error(), "{}", input);
        }

        let err = bridge
            .read_csv_many(
                vec![CsvSource::from(CSV), CsvSource::from("ftp://host/data.csv")],
                ReadOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(bridge.stats().total(Direction::Outbound), before);

        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_many_keeps_sources_apart() {
        let bridge = Bridge::start_polars(BridgeConfig::default()).await.unwrap();

        let frames = bridge
            .read_csv_many(
                [
                    CsvSource::from(&b"a\n1\n2\n"[..]),
                    CsvSource::from(CSV),
                    CsvSource::from(&b"x,y\n1,2\n"[..]),
                ],
                ReadOptions::default(),
            )
            .await
            .unwrap();

        let mut shapes = Vec::new();
        for frame in &frames {
            shapes.push(frame.shape().await.unwrap());
        }
        assert_eq!(
            shapes,
            vec![Shape::new(2, 1), Shape::new(4, 3), Shape::new(1, 2)]
        );

        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_configured_read_defaults_apply() {
        let config = BridgeConfig::from_toml_str("[read]\nhasHeader = false\nsep = \";\"\n").unwrap();
        let bridge = Bridge::start_polars(config).await.unwrap();

        let frame = bridge
            .read_csv(&b"1;2\n3;4\n"[..], ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(frame.shape().await.unwrap(), Shape::new(2, 2));

        // Caller options win over configured ones.
        let frame = bridge
            .read_csv(&b"a,b\n3,4\n"[..], ReadOptions::default().with_has_header(true).with_separator(","))
            .await
            .unwrap();
        assert_eq!(frame.columns().await.unwrap(), vec!["a", "b"]);

        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_engine_errors_reach_caller() {
        let bridge = Bridge::start_polars(BridgeConfig::default()).await.unwrap();
        let frame = bridge.read_csv(CSV, ReadOptions::default()).await.unwrap();

        let err = frame
            .lazy()
            .select([col("missing")])
            .collect()
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Engine(_)));

        let err = bridge
            .read_csv(CSV, ReadOptions::default().with_encoding("latin1"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidOptions(_)));

        // Still serving after both failures.
        assert_eq!(frame.shape().await.unwrap(), Shape::new(4, 3));
        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_init_fails_start() {
        let mut engine = RecordingEngine::new(Arc::new(Mutex::new(Vec::new())));
        engine.fail_init = true;
        let err = Bridge::start(BridgeConfig::default(), engine).await.err().unwrap();
        assert!(matches!(err, BridgeError::Engine(_)));
    }

    #[tokio::test]
    async fn test_proxies_outliving_bridge_fail_cleanly() {
        let bridge = Bridge::start_polars(BridgeConfig::default()).await.unwrap();
        let frame = bridge.read_csv(CSV, ReadOptions::default()).await.unwrap();
        bridge.shutdown().await.unwrap();

        let err = frame.shape().await.unwrap_err();
        assert!(err.is_worker_exited());
        drop(frame);
    }
}
