use crate::config::{Config, FallbackConfig, ValidationConfig};
use crate::datasources::ForecastProvider;
use crate::db::DecisionStore;
use crate::error::Result;
use crate::logic::decision::{DecisionPolicy, NoRuleFiredPolicy};
use crate::logic::fuzzy::{ControlSystem, FuzzyError};
use crate::logic::validation::{AnomalySink, FallbackCache, SensorValidator, TracingAnomalySink};
use crate::models::{DecisionRecord, PumpState, RainForecast, RawTelemetry};
use crate::transport::{CommandSink, TelemetryMessage, TelemetrySource};
use chrono::Utc;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Everything about a decision cycle that comes from configuration.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub policy: DecisionPolicy,
    pub no_rule_fired: NoRuleFiredPolicy,
    pub validation: ValidationConfig,
    pub fallback: FallbackConfig,
    pub forecast_timeout: Duration,
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            policy: config.policy.tiers.build()?,
            no_rule_fired: config.policy.no_rule_fired,
            validation: config.validation.clone(),
            fallback: config.fallback.clone(),
            forecast_timeout: Duration::from_secs(config.forecast.timeout_secs),
        })
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            policy: DecisionPolicy::three_tier(),
            no_rule_fired: NoRuleFiredPolicy::Off,
            validation: ValidationConfig::default(),
            fallback: FallbackConfig::default(),
            forecast_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    cache: FallbackCache,
    last_state: Option<PumpState>,
}

/// Runs decision cycles: validate, infer, map, record.
///
/// Per-device state lives behind one mutex, so cycles for the same device
/// never interleave their cache updates.
pub struct DecisionService<F, S> {
    system: Arc<ControlSystem>,
    forecast: F,
    store: S,
    options: ServiceOptions,
    validator: SensorValidator,
    anomalies: Box<dyn AnomalySink>,
    devices: Mutex<HashMap<String, DeviceState>>,
}

impl<F, S> DecisionService<F, S>
where
    F: ForecastProvider,
    S: DecisionStore,
{
    pub fn new(system: Arc<ControlSystem>, forecast: F, store: S, options: ServiceOptions) -> Self {
        let validator = SensorValidator::new(options.validation.clone());
        Self {
            system,
            forecast,
            store,
            options,
            validator,
            anomalies: Box::new(TracingAnomalySink),
            devices: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_anomaly_sink(mut self, sink: Box<dyn AnomalySink>) -> Self {
        self.anomalies = sink;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn control_system(&self) -> &ControlSystem {
        &self.system
    }

    /// Rain forecast for this cycle. Failures and timeouts degrade to 0%.
    pub async fn forecast(&self) -> RainForecast {
        match tokio::time::timeout(self.options.forecast_timeout, self.forecast.rain_forecast())
            .await
        {
            Ok(Ok(forecast)) => forecast,
            Ok(Err(e)) => {
                warn!("Forecast unavailable, assuming no rain: {}", e);
                RainForecast::neutral()
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.options.forecast_timeout.as_secs_f64(),
                    "Forecast timed out, assuming no rain"
                );
                RainForecast::neutral()
            }
        }
    }

    /// One full decision cycle for a telemetry message.
    pub async fn handle(&self, message: &TelemetryMessage) -> Result<DecisionRecord> {
        let forecast = self.forecast().await;
        self.decide(&message.device_id, &message.telemetry, forecast)
    }

    /// Decision cycle with an already-fetched forecast.
    ///
    /// Blocks on the store: one history read the first time a device is seen,
    /// and one write per cycle. The device map is not locked during either.
    pub fn decide(
        &self,
        device_id: &str,
        raw: &RawTelemetry,
        forecast: RainForecast,
    ) -> Result<DecisionRecord> {
        let known = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(device_id);
        let seed = (!known).then(|| self.cold_start(device_id));

        let mut devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        let device = match devices.entry(device_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(seed.unwrap_or_default()),
        };

        let validated = self.validator.validate(raw, &mut device.cache);
        for anomaly in &validated.anomalies {
            self.anomalies.report(device_id, anomaly);
        }

        let inputs = validated.reading.to_inputs(forecast.probability);
        let (score, state) = match self.system.compute(&inputs) {
            Ok(inference) => {
                debug!(device = %device_id, strengths = ?inference.strengths, "Rule strengths");
                (Some(inference.score), self.options.policy.map(inference.score))
            }
            Err(FuzzyError::NoRuleFired) => {
                let state = self.options.no_rule_fired.resolve(device.last_state);
                warn!(device = %device_id, state = %state, "No rule fired");
                (None, state)
            }
            Err(e) => return Err(e.into()),
        };
        device.last_state = Some(state);
        drop(devices);

        let record = DecisionRecord {
            device_id: device_id.to_string(),
            score,
            state,
            reading: validated.reading,
            rain_probability: forecast.probability,
            forecast_time: forecast.forecast_time,
            anomalies: validated.anomalies,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.record_decision(&record) {
            warn!("Failed to record decision for {}: {}", device_id, e);
        }

        info!(
            device = %device_id,
            score = ?record.score,
            state = %record.state,
            soil_moisture = record.reading.soil_moisture,
            temperature = record.reading.temperature,
            humidity = record.reading.humidity,
            raining = record.reading.is_raining,
            rain_probability = record.rain_probability,
            "Irrigation decision"
        );

        Ok(record)
    }

    fn cold_start(&self, device_id: &str) -> DeviceState {
        let fallback = &self.options.fallback;
        let seeded = FallbackCache::seeded(fallback.seed_temperature, fallback.seed_humidity);

        let cache = if fallback.from_history {
            match self.store.last_reading(device_id) {
                Ok(Some(reading)) => {
                    debug!(device = %device_id, "Seeding fallback cache from history");
                    FallbackCache::seeded(Some(reading.temperature), Some(reading.humidity))
                }
                Ok(None) => seeded,
                Err(e) => {
                    warn!("Failed to read history for {}: {}", device_id, e);
                    seeded
                }
            }
        } else {
            seeded
        };

        DeviceState {
            cache,
            last_state: None,
        }
    }

    /// Consume telemetry until the stream ends or `shutdown` resolves, then
    /// command OFF on every device that was commanded.
    ///
    /// A source error also ends the loop, but only after the OFF commands
    /// have gone out. A failed publish is logged and the loop keeps going.
    pub async fn serve<T, C>(
        &self,
        source: &mut T,
        sink: &mut C,
        shutdown: impl Future<Output = ()>,
    ) -> Result<usize>
    where
        T: TelemetrySource,
        C: CommandSink,
    {
        tokio::pin!(shutdown);
        let mut commanded = BTreeSet::new();
        let mut cycles = 0;
        let mut failure = None;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                message = source.next_message() => {
                    let message = match message {
                        Ok(Some(message)) => message,
                        Ok(None) => {
                            info!("Telemetry stream closed");
                            break;
                        }
                        Err(e) => {
                            error!("Telemetry stream failed: {}", e);
                            failure = Some(e);
                            break;
                        }
                    };
                    match self.handle(&message).await {
                        Ok(record) => {
                            cycles += 1;
                            if let Err(e) = sink.publish(&record.device_id, record.state).await {
                                warn!(
                                    "Failed to command {} to {}: {}",
                                    record.device_id, record.state, e
                                );
                            }
                            // Even a failed publish may have reached the device
                            commanded.insert(record.device_id);
                        }
                        Err(e) => warn!("Decision cycle failed for {}: {}", message.device_id, e),
                    }
                }
            }
        }

        for device_id in &commanded {
            match sink.publish(device_id, PumpState::Off).await {
                Ok(()) => info!(device = %device_id, "Pump stopped on shutdown"),
                Err(e) => warn!("Failed to stop pump on {}: {}", device_id, e),
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(cycles),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MemoryStore};
    use crate::error::IrrigoError;
    use crate::logic::decision::Tier;
    use crate::logic::fuzzy::{Antecedent, MembershipFunction, Rule, RuleBase, VariableRegistry};
    use crate::logic::rules::{build_control_system, RuleSetSource};
    use crate::logic::validation::SensorAnomaly;
    use crate::models::{RawValue, SensorReading};
    use crate::transport::LineTransport;
    use std::collections::VecDeque;

    struct FixedForecast(f64);

    impl ForecastProvider for FixedForecast {
        async fn rain_forecast(&self) -> Result<RainForecast> {
            Ok(RainForecast::new(self.0, None))
        }
    }

    struct FailingForecast;

    impl ForecastProvider for FailingForecast {
        async fn rain_forecast(&self) -> Result<RainForecast> {
            Err(IrrigoError::DataSourceUnavailable("offline".into()))
        }
    }

    struct SlowForecast;

    impl ForecastProvider for SlowForecast {
        async fn rain_forecast(&self) -> Result<RainForecast> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(RainForecast::new(90.0, None))
        }
    }

    struct FailingStore;

    impl DecisionStore for FailingStore {
        fn record_decision(&self, _record: &DecisionRecord) -> Result<()> {
            Err(IrrigoError::InvalidData("disk full".into()))
        }

        fn last_reading(&self, _device_id: &str) -> Result<Option<SensorReading>> {
            Err(IrrigoError::InvalidData("disk full".into()))
        }
    }

    #[derive(Default)]
    struct RecordingAnomalies(Arc<Mutex<Vec<(String, SensorAnomaly)>>>);

    impl AnomalySink for RecordingAnomalies {
        fn report(&self, device_id: &str, anomaly: &SensorAnomaly) {
            self.0
                .lock()
                .unwrap()
                .push((device_id.to_string(), anomaly.clone()));
        }
    }

    struct QueueSource(VecDeque<TelemetryMessage>);

    impl TelemetrySource for QueueSource {
        async fn next_message(&mut self) -> Result<Option<TelemetryMessage>> {
            Ok(self.0.pop_front())
        }
    }

    /// Yields its queue, then fails the way a dropped connection does.
    struct BrokenSource(VecDeque<TelemetryMessage>);

    impl TelemetrySource for BrokenSource {
        async fn next_message(&mut self) -> Result<Option<TelemetryMessage>> {
            match self.0.pop_front() {
                Some(message) => Ok(Some(message)),
                None => Err(IrrigoError::Transport("connection reset".into())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink(Vec<(String, PumpState)>);

    impl CommandSink for RecordingSink {
        async fn publish(&mut self, device_id: &str, state: PumpState) -> Result<()> {
            self.0.push((device_id.to_string(), state));
            Ok(())
        }
    }

    /// Drops the first `failures` publishes, records the rest.
    struct FlakySink {
        failures: usize,
        sent: Vec<(String, PumpState)>,
    }

    impl CommandSink for FlakySink {
        async fn publish(&mut self, device_id: &str, state: PumpState) -> Result<()> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(IrrigoError::Transport("broken pipe".into()));
            }
            self.sent.push((device_id.to_string(), state));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        history_reads: Mutex<usize>,
    }

    impl DecisionStore for CountingStore {
        fn record_decision(&self, record: &DecisionRecord) -> Result<()> {
            self.inner.record_decision(record)
        }

        fn last_reading(&self, device_id: &str) -> Result<Option<SensorReading>> {
            *self.history_reads.lock().unwrap() += 1;
            self.inner.last_reading(device_id)
        }
    }

    fn canonical() -> Arc<ControlSystem> {
        Arc::new(build_control_system(&RuleSetSource::Complete).unwrap())
    }

    fn service<F: ForecastProvider, S: DecisionStore>(
        forecast: F,
        store: S,
    ) -> DecisionService<F, S> {
        DecisionService::new(canonical(), forecast, store, ServiceOptions::default())
    }

    fn message(device: &str, telemetry: RawTelemetry) -> TelemetryMessage {
        TelemetryMessage {
            device_id: device.to_string(),
            telemetry,
        }
    }

    #[tokio::test]
    async fn hot_dry_soil_runs_high() {
        let svc = service(FixedForecast(5.0), MemoryStore::new());
        let record = svc
            .handle(&message("esp32-01", RawTelemetry::new(32.0, 30.0, 15.0, false)))
            .await
            .unwrap();

        let score = record.score.unwrap();
        assert!((score - 86.71).abs() < 0.05, "score was {}", score);
        assert_eq!(record.state, PumpState::High);
        assert_eq!(record.rain_probability, 5.0);
        assert!(record.anomalies.is_empty());
        assert_eq!(svc.store().records().len(), 1);
    }

    #[tokio::test]
    async fn wet_soil_and_rain_is_off() {
        let svc = service(FixedForecast(5.0), MemoryStore::new());
        let record = svc
            .handle(&message("esp32-01", RawTelemetry::new(32.0, 20.0, 85.0, true)))
            .await
            .unwrap();
        assert!(record.score.unwrap() < 15.0);
        assert_eq!(record.state, PumpState::Off);
    }

    #[tokio::test]
    async fn binary_policy_maps_to_on() {
        let options = ServiceOptions {
            policy: DecisionPolicy::binary(),
            ..ServiceOptions::default()
        };
        let svc = DecisionService::new(canonical(), FixedForecast(5.0), MemoryStore::new(), options);
        let record = svc
            .handle(&message("a", RawTelemetry::new(32.0, 30.0, 15.0, false)))
            .await
            .unwrap();
        assert_eq!(record.state, PumpState::On);
        assert_eq!(record.state.token(), "1");
    }

    #[tokio::test]
    async fn nan_temperature_falls_back_to_seed() {
        let anomalies = RecordingAnomalies::default();
        let seen = Arc::clone(&anomalies.0);
        let svc = service(FixedForecast(5.0), MemoryStore::new())
            .with_anomaly_sink(Box::new(anomalies));

        let raw = RawTelemetry {
            temperature: Some(RawValue::Number(f64::NAN)),
            ..RawTelemetry::new(0.0, 30.0, 15.0, false)
        };
        let record = svc.handle(&message("a", raw)).await.unwrap();

        // Cold-start seed, since the store has no history
        assert_eq!(record.reading.temperature, 28.0);
        assert_eq!(record.anomalies.len(), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "a");
    }

    #[tokio::test]
    async fn cache_is_per_device() {
        let svc = service(FixedForecast(5.0), MemoryStore::new());
        svc.handle(&message("a", RawTelemetry::new(35.0, 40.0, 30.0, false)))
            .await
            .unwrap();

        let dropout = RawTelemetry {
            temperature: None,
            ..RawTelemetry::new(0.0, 40.0, 30.0, false)
        };
        let a = svc.handle(&message("a", dropout.clone())).await.unwrap();
        assert_eq!(a.reading.temperature, 35.0);

        // "b" has no cache of its own and seeds from the newest stored reading
        let b = svc.handle(&message("b", dropout)).await.unwrap();
        assert_eq!(b.reading.temperature, 35.0);
    }

    #[tokio::test]
    async fn cold_start_ignores_history_when_disabled() {
        let store = Arc::new(MemoryStore::new());
        let first = service(FixedForecast(5.0), Arc::clone(&store));
        first
            .handle(&message("a", RawTelemetry::new(35.0, 40.0, 30.0, false)))
            .await
            .unwrap();

        let options = ServiceOptions {
            fallback: FallbackConfig {
                from_history: false,
                ..FallbackConfig::default()
            },
            ..ServiceOptions::default()
        };
        let restarted = DecisionService::new(canonical(), FixedForecast(5.0), store, options);
        let dropout = RawTelemetry {
            temperature: None,
            ..RawTelemetry::new(0.0, 40.0, 30.0, false)
        };
        let record = restarted.handle(&message("a", dropout)).await.unwrap();
        assert_eq!(record.reading.temperature, 28.0);
    }

    #[tokio::test]
    async fn history_survives_restart_in_sqlite() {
        let db = Database::open_in_memory().unwrap();
        let first = service(FixedForecast(5.0), db.clone());
        first
            .handle(&message("a", RawTelemetry::new(33.0, 44.0, 30.0, false)))
            .await
            .unwrap();

        let restarted = service(FixedForecast(5.0), db.clone());
        let dropout = RawTelemetry {
            temperature: None,
            humidity: None,
            ..RawTelemetry::new(0.0, 0.0, 30.0, false)
        };
        let record = restarted.handle(&message("a", dropout)).await.unwrap();
        assert_eq!(record.reading.temperature, 33.0);
        assert_eq!(record.reading.humidity, 44.0);
        assert_eq!(db.recent_decisions(Some("a"), 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn forecast_failure_degrades_to_zero() {
        let svc = service(FailingForecast, MemoryStore::new());
        let record = svc
            .handle(&message("a", RawTelemetry::new(32.0, 30.0, 15.0, false)))
            .await
            .unwrap();
        assert_eq!(record.rain_probability, 0.0);
        assert_eq!(record.state, PumpState::High);
    }

    #[tokio::test]
    async fn forecast_timeout_degrades_to_zero() {
        let options = ServiceOptions {
            forecast_timeout: Duration::from_millis(50),
            ..ServiceOptions::default()
        };
        let svc = DecisionService::new(canonical(), SlowForecast, MemoryStore::new(), options);
        let forecast = svc.forecast().await;
        assert_eq!(forecast, RainForecast::neutral());
    }

    #[tokio::test]
    async fn store_failure_still_decides() {
        let svc = service(FixedForecast(5.0), FailingStore);
        let first = svc
            .handle(&message("a", RawTelemetry::new(31.0, 50.0, 15.0, false)))
            .await
            .unwrap();
        assert_eq!(first.state, PumpState::High);

        // The cache was still updated even though nothing was persisted
        let dropout = RawTelemetry {
            temperature: None,
            ..RawTelemetry::new(0.0, 50.0, 15.0, false)
        };
        let second = svc.handle(&message("a", dropout)).await.unwrap();
        assert_eq!(second.reading.temperature, 31.0);
    }

    fn silent_system() -> Arc<ControlSystem> {
        // Only fires for high soil moisture; everything else has zero area
        let mut registry = VariableRegistry::new();
        for (name, max) in [
            ("temperature", 50.0),
            ("humidity", 100.0),
            ("soil_moisture", 100.0),
            ("rain_probability", 100.0),
        ] {
            registry.define_variable(name, 0.0, max, 1.0).unwrap();
        }
        registry.define_variable("is_raining", 0.0, 1.0, 1.0).unwrap();
        registry
            .add_set(
                "soil_moisture",
                "soaked",
                MembershipFunction::triangular(90.0, 100.0, 100.0).unwrap(),
            )
            .unwrap();
        registry
            .define_variable("irrigation_volume", 0.0, 100.0, 1.0)
            .unwrap();
        registry
            .add_set(
                "irrigation_volume",
                "none",
                MembershipFunction::trapezoidal(0.0, 0.0, 5.0, 18.0).unwrap(),
            )
            .unwrap();
        let rules = RuleBase::build(
            &registry,
            "irrigation_volume",
            vec![Rule::new(Antecedent::is("soil_moisture", "soaked"), "none")],
        )
        .unwrap();
        Arc::new(ControlSystem::new(registry, rules).unwrap())
    }

    #[tokio::test]
    async fn no_rule_fired_policies() {
        let off = DecisionService::new(
            silent_system(),
            FixedForecast(0.0),
            MemoryStore::new(),
            ServiceOptions::default(),
        );
        let record = off
            .handle(&message("a", RawTelemetry::new(30.0, 50.0, 40.0, false)))
            .await
            .unwrap();
        assert!(record.no_rule_fired());
        assert_eq!(record.state, PumpState::Off);

        let hold = DecisionService::new(
            silent_system(),
            FixedForecast(0.0),
            MemoryStore::new(),
            ServiceOptions {
                // Any positive score commands LOW
                policy: DecisionPolicy::new(
                    vec![Tier {
                        above: 0.0,
                        state: PumpState::Low,
                    }],
                    PumpState::Off,
                )
                .unwrap(),
                no_rule_fired: NoRuleFiredPolicy::Hold,
                ..ServiceOptions::default()
            },
        );
        let fired = hold
            .handle(&message("a", RawTelemetry::new(30.0, 50.0, 98.0, false)))
            .await
            .unwrap();
        assert_eq!(fired.state, PumpState::Low);
        let held = hold
            .handle(&message("a", RawTelemetry::new(30.0, 50.0, 40.0, false)))
            .await
            .unwrap();
        assert!(held.no_rule_fired());
        assert_eq!(held.state, PumpState::Low);

        // A device that never fired has nothing to hold
        let fresh = hold
            .handle(&message("b", RawTelemetry::new(30.0, 50.0, 40.0, false)))
            .await
            .unwrap();
        assert_eq!(fresh.state, PumpState::Off);
    }

    #[tokio::test]
    async fn serve_publishes_then_stops_pumps() {
        let svc = service(FixedForecast(5.0), MemoryStore::new());
        let mut source = QueueSource(VecDeque::from(vec![
            message("b", RawTelemetry::new(32.0, 30.0, 15.0, false)),
            message("a", RawTelemetry::new(32.0, 20.0, 85.0, true)),
            message("b", RawTelemetry::new(32.0, 30.0, 15.0, false)),
        ]));
        let mut sink = RecordingSink::default();

        let cycles = svc
            .serve(&mut source, &mut sink, std::future::pending())
            .await
            .unwrap();

        assert_eq!(cycles, 3);
        assert_eq!(
            sink.0,
            vec![
                ("b".to_string(), PumpState::High),
                ("a".to_string(), PumpState::Off),
                ("b".to_string(), PumpState::High),
                ("a".to_string(), PumpState::Off),
                ("b".to_string(), PumpState::Off),
            ]
        );
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let svc = service(FixedForecast(5.0), MemoryStore::new());
        let mut source = QueueSource(VecDeque::new());
        let mut sink = RecordingSink::default();
        let cycles = svc
            .serve(&mut source, &mut sink, std::future::ready(()))
            .await
            .unwrap();
        assert_eq!(cycles, 0);
        assert!(sink.0.is_empty());
    }

    #[tokio::test]
    async fn history_is_read_once_per_device() {
        let svc = service(FixedForecast(5.0), CountingStore::default());
        for _ in 0..3 {
            svc.handle(&message("a", RawTelemetry::new(32.0, 30.0, 15.0, false)))
                .await
                .unwrap();
        }
        svc.handle(&message("b", RawTelemetry::new(32.0, 30.0, 15.0, false)))
            .await
            .unwrap();
        assert_eq!(*svc.store().history_reads.lock().unwrap(), 2);
        assert_eq!(svc.store().inner.records().len(), 4);
    }

    #[tokio::test]
    async fn serve_survives_line_noise() {
        let svc = service(FixedForecast(5.0), MemoryStore::new());
        let mut input = br#"{"topic":"device/a/telemetry","payload":{"Temperature":32,"Humidity":30,"Soil_moisture":15,"Raining":0}}"#.to_vec();
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(br#"{"topic":"device/b/telemetry","payload":{"Temperature":32,"Humidity":20,"Soil_moisture":85,"Raining":1}}"#);
        input.push(b'\n');

        let mut source = LineTransport::new(&input[..], "serial").unwrap();
        let mut sink = RecordingSink::default();
        let cycles = svc
            .serve(&mut source, &mut sink, std::future::pending())
            .await
            .unwrap();

        assert_eq!(cycles, 2);
        assert_eq!(
            sink.0,
            vec![
                ("a".to_string(), PumpState::High),
                ("b".to_string(), PumpState::Off),
                ("a".to_string(), PumpState::Off),
                ("b".to_string(), PumpState::Off),
            ]
        );
    }

    #[tokio::test]
    async fn source_error_still_stops_pumps() {
        let svc = service(FixedForecast(5.0), MemoryStore::new());
        let mut source = BrokenSource(VecDeque::from(vec![message(
            "a",
            RawTelemetry::new(32.0, 30.0, 15.0, false),
        )]));
        let mut sink = RecordingSink::default();

        let result = svc
            .serve(&mut source, &mut sink, std::future::pending())
            .await;

        assert!(matches!(result, Err(IrrigoError::Transport(_))));
        assert_eq!(
            sink.0,
            vec![
                ("a".to_string(), PumpState::High),
                ("a".to_string(), PumpState::Off),
            ]
        );
    }

    #[tokio::test]
    async fn publish_failure_keeps_serving() {
        let svc = service(FixedForecast(5.0), MemoryStore::new());
        let mut source = QueueSource(VecDeque::from(vec![
            message("a", RawTelemetry::new(32.0, 30.0, 15.0, false)),
            message("b", RawTelemetry::new(32.0, 30.0, 15.0, false)),
        ]));
        let mut sink = FlakySink {
            failures: 1,
            sent: Vec::new(),
        };

        let cycles = svc
            .serve(&mut source, &mut sink, std::future::pending())
            .await
            .unwrap();

        // "a" missed its HIGH but is still stopped on the way out
        assert_eq!(cycles, 2);
        assert_eq!(
            sink.sent,
            vec![
                ("b".to_string(), PumpState::High),
                ("a".to_string(), PumpState::Off),
                ("b".to_string(), PumpState::Off),
            ]
        );
    }

    #[tokio::test]
    async fn failed_cycles_do_not_end_serve() {
        // Rules over an input telemetry never carries
        let mut registry = VariableRegistry::new();
        registry.define_variable("wind", 0.0, 30.0, 1.0).unwrap();
        registry
            .add_set(
                "wind",
                "calm",
                MembershipFunction::triangular(0.0, 0.0, 10.0).unwrap(),
            )
            .unwrap();
        registry
            .define_variable("irrigation_volume", 0.0, 100.0, 1.0)
            .unwrap();
        registry
            .add_set(
                "irrigation_volume",
                "low",
                MembershipFunction::triangular(0.0, 30.0, 60.0).unwrap(),
            )
            .unwrap();
        let rules = RuleBase::build(
            &registry,
            "irrigation_volume",
            vec![Rule::new(Antecedent::is("wind", "calm"), "low")],
        )
        .unwrap();
        let system = Arc::new(ControlSystem::new(registry, rules).unwrap());

        let svc = DecisionService::new(
            system,
            FailingForecast,
            MemoryStore::new(),
            ServiceOptions::default(),
        );
        let mut source = QueueSource(VecDeque::from(vec![
            message("a", RawTelemetry::new(32.0, 30.0, 15.0, false)),
            message("b", RawTelemetry::new(32.0, 30.0, 15.0, false)),
        ]));
        let mut sink = RecordingSink::default();

        let cycles = svc
            .serve(&mut source, &mut sink, std::future::pending())
            .await
            .unwrap();

        assert_eq!(cycles, 0);
        assert!(source.0.is_empty());
        assert!(sink.0.is_empty());
    }
}
