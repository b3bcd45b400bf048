use std::sync::Arc;
use std::time::Duration;

use barrage_attack::TrafficGenerator;
use barrage_types::{
    Conventions, Endpoint, LoadTestError, ValidationError, DEFAULT_DURATION, DEFAULT_RATE,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::attack_loop::{AttackLoop, LoopExit};
use crate::channel::ResultSender;
use crate::layer::{check_rate, Layer, LayerOverrides};

/// A named load test: default settings plus the layers registered on it.
#[derive(Debug)]
pub struct LoadTest {
    name: String,
    conventions: Conventions,
    rate: u64,
    duration: Duration,
    layers: Vec<Layer>,
}

impl LoadTest {
    pub fn new(name: impl Into<String>, conventions: Conventions) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::EmptyTestName);
        }
        Ok(Self {
            name,
            conventions,
            rate: DEFAULT_RATE,
            duration: DEFAULT_DURATION,
            layers: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name() == name)
    }

    pub fn endpoint_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.endpoints().len()).sum()
    }

    /// Sets the default rate. Only allowed before the first layer is
    /// registered.
    pub fn set_rate(&mut self, rate: u64) -> Result<(), ValidationError> {
        self.ensure_unfrozen()?;
        check_rate(rate)?;
        self.rate = rate;
        Ok(())
    }

    /// Sets the default cycle duration. Only allowed before the first layer
    /// is registered.
    pub fn set_duration(&mut self, duration: Duration) -> Result<(), ValidationError> {
        self.ensure_unfrozen()?;
        if duration.is_zero() {
            return Err(ValidationError::ZeroDuration);
        }
        self.duration = duration;
        Ok(())
    }

    pub fn register(
        &mut self,
        name: &str,
        endpoints: impl IntoIterator<Item = Endpoint>,
    ) -> Result<&Layer, LoadTestError> {
        self.register_with(name, endpoints, LayerOverrides::default())
    }

    pub fn register_with(
        &mut self,
        name: &str,
        endpoints: impl IntoIterator<Item = Endpoint>,
        overrides: LayerOverrides,
    ) -> Result<&Layer, LoadTestError> {
        if self.layer(name.trim()).is_some() {
            return Err(ValidationError::DuplicateLayer {
                layer: name.trim().to_string(),
            }
            .into());
        }

        let settings = overrides.apply(self.rate, self.duration)?;
        let layer = Layer::build(&self.name, name, endpoints, settings, &self.conventions)?;
        info!(
            "Registered layer {} with {} endpoint(s) at {} req/s",
            layer.name(),
            layer.endpoints().len(),
            layer.rate()
        );

        self.layers.push(layer);
        Ok(&self.layers[self.layers.len() - 1])
    }

    /// Spawns one attack loop per (layer, endpoint) pair on the current
    /// runtime and returns immediately.
    ///
    /// Every loop owns a clone of `sink`; the channel closes for the
    /// aggregator once all loops have stopped.
    pub fn run(
        self,
        generator: Arc<dyn TrafficGenerator>,
        sink: ResultSender,
    ) -> Result<RunHandle, ValidationError> {
        if self.layers.is_empty() {
            return Err(ValidationError::NoLayers { test: self.name });
        }

        let cancel = CancellationToken::new();
        let test_name: Arc<str> = Arc::from(self.name.as_str());
        let mut loops = Vec::with_capacity(self.endpoint_count());

        for layer in &self.layers {
            let layer_name: Arc<str> = Arc::from(layer.name());
            for target in layer.targets() {
                let attack_loop = AttackLoop {
                    test_name: test_name.clone(),
                    layer: layer_name.clone(),
                    target: target.clone(),
                    rate: layer.rate(),
                    duration: layer.duration(),
                    generator: generator.clone(),
                    sink: sink.clone(),
                    cancel: cancel.child_token(),
                };
                loops.push(tokio::spawn(attack_loop.run()));
            }
        }

        info!(
            "Load test {} started: {} layer(s), {} attack loop(s)",
            self.name,
            self.layers.len(),
            loops.len()
        );

        Ok(RunHandle {
            test_name: self.name,
            cancel,
            loops,
        })
    }

    fn ensure_unfrozen(&self) -> Result<(), ValidationError> {
        if self.layers.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::DefaultsFrozen {
                test: self.name.clone(),
            })
        }
    }
}

/// Handle to the attack loops of a running load test.
pub struct RunHandle {
    test_name: String,
    cancel: CancellationToken,
    loops: Vec<JoinHandle<LoopExit>>,
}

impl RunHandle {
    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Token observed by every loop between cycles.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops starting new cycles and waits for every loop to finish the
    /// cycle it is in, including pushing its results.
    pub async fn shutdown(self) {
        info!("Stopping load test {}", self.test_name);
        self.cancel.cancel();
        self.join().await;
    }

    /// Waits for every loop without cancelling them. Loops only stop on
    /// cancellation or when the result channel closes.
    pub async fn join(self) {
        let mut cancelled = 0usize;
        let mut closed = 0usize;
        for handle in self.loops {
            match handle.await {
                Ok(LoopExit::Cancelled) => cancelled += 1,
                Ok(LoopExit::ChannelClosed) => closed += 1,
                Err(err) => warn!("Attack loop task failed: {}", err),
            }
        }
        info!(
            "Load test {} stopped ({} cancelled, {} on closed channel)",
            self.test_name, cancelled, closed
        );
    }
}
