use std::collections::BTreeMap;
use std::time::Duration;

use barrage_attack::AttackTarget;
use barrage_types::{Conventions, Endpoint, LoadTestError, ValidationError, MAX_RATE};

/// Rate, cycle duration and extra headers a layer runs with, fixed at
/// registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSettings {
    pub rate: u64,
    pub duration: Duration,
    pub headers: BTreeMap<String, String>,
}

/// Per-layer departures from the load test defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerOverrides {
    pub rate: Option<u64>,
    pub duration: Option<Duration>,
    pub headers: BTreeMap<String, String>,
}

impl LayerOverrides {
    pub fn rate(mut self, rate: u64) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub(crate) fn apply(
        self,
        rate: u64,
        duration: Duration,
    ) -> Result<LayerSettings, ValidationError> {
        let rate = self.rate.unwrap_or(rate);
        let duration = self.duration.unwrap_or(duration);
        check_rate(rate)?;
        if duration.is_zero() {
            return Err(ValidationError::ZeroDuration);
        }
        Ok(LayerSettings {
            rate,
            duration,
            headers: self.headers,
        })
    }
}

pub(crate) fn check_rate(rate: u64) -> Result<(), ValidationError> {
    if rate == 0 {
        return Err(ValidationError::ZeroRate);
    }
    if rate > MAX_RATE {
        return Err(ValidationError::RateTooHigh {
            rate,
            max: MAX_RATE,
        });
    }
    Ok(())
}

/// A named group of endpoints attacked with the same settings.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    endpoints: Vec<Endpoint>,
    settings: LayerSettings,
    targets: Vec<AttackTarget>,
}

impl Layer {
    pub(crate) fn build(
        test_name: &str,
        name: &str,
        endpoints: impl IntoIterator<Item = Endpoint>,
        settings: LayerSettings,
        conventions: &Conventions,
    ) -> Result<Self, LoadTestError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyLayerName.into());
        }

        let mut unique: Vec<Endpoint> = Vec::new();
        for endpoint in endpoints {
            if !unique.contains(&endpoint) {
                unique.push(endpoint);
            }
        }
        if unique.is_empty() {
            return Err(ValidationError::NoEndpoints {
                layer: name.to_string(),
            }
            .into());
        }

        let targets = unique
            .iter()
            .map(|endpoint| {
                let headers = request_headers(test_name, name, endpoint, &settings, conventions);
                AttackTarget::new(endpoint, &headers)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            endpoints: unique,
            settings,
            targets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    pub fn rate(&self) -> u64 {
        self.settings.rate
    }

    pub fn duration(&self) -> Duration {
        self.settings.duration
    }

    /// One validated request template per endpoint, in endpoint order.
    pub fn targets(&self) -> &[AttackTarget] {
        &self.targets
    }
}

/// Layer headers plus the standard attribution headers. The standard headers
/// replace any extra header with the same (case-insensitive) name.
fn request_headers(
    test_name: &str,
    layer: &str,
    endpoint: &Endpoint,
    settings: &LayerSettings,
    conventions: &Conventions,
) -> BTreeMap<String, String> {
    let standard = [
        (&conventions.headers.endpoint, endpoint.as_str()),
        (&conventions.headers.target, layer),
        (&conventions.headers.test, test_name),
    ];

    let mut headers: BTreeMap<String, String> = settings
        .headers
        .iter()
        .filter(|(name, _)| {
            !standard
                .iter()
                .any(|(standard_name, _)| standard_name.eq_ignore_ascii_case(name))
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    for (name, value) in standard {
        headers.insert(name.clone(), value.to_string());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use barrage_types::ConstructionError;

    fn settings() -> LayerSettings {
        LayerOverrides::default()
            .header("X-Env", "canary")
            .apply(100, Duration::from_secs(1))
            .unwrap()
    }

    #[test]
    fn overrides_replace_defaults() {
        let settings = LayerOverrides::default()
            .rate(5)
            .apply(100, Duration::from_secs(1))
            .unwrap();
        assert_eq!(settings.rate, 5);
        assert_eq!(settings.duration, Duration::from_secs(1));
    }

    #[test]
    fn zero_overrides_are_rejected() {
        let err = LayerOverrides::default()
            .rate(0)
            .apply(100, Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err, ValidationError::ZeroRate);

        let err = LayerOverrides::default()
            .duration(Duration::ZERO)
            .apply(100, Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err, ValidationError::ZeroDuration);
    }

    #[test]
    fn rate_is_bounded_above() {
        let settings = LayerOverrides::default()
            .rate(MAX_RATE)
            .apply(100, Duration::from_secs(1))
            .unwrap();
        assert_eq!(settings.rate, MAX_RATE);

        let err = LayerOverrides::default()
            .apply(u64::MAX, Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::RateTooHigh {
                rate: u64::MAX,
                max: MAX_RATE
            }
        );
    }

    #[test]
    fn duplicate_endpoints_collapse_in_order() {
        let layer = Layer::build(
            "smoke",
            "api",
            [
                Endpoint::new("http://b/"),
                Endpoint::new("http://a/"),
                Endpoint::new("http://b/"),
            ],
            settings(),
            &Conventions::default(),
        )
        .unwrap();

        let endpoints: Vec<&str> = layer.endpoints().iter().map(Endpoint::as_str).collect();
        assert_eq!(endpoints, vec!["http://b/", "http://a/"]);
        assert_eq!(layer.targets().len(), 2);
    }

    #[test]
    fn targets_carry_standard_and_extra_headers() {
        let layer = Layer::build(
            "smoke",
            "api",
            [Endpoint::new("http://localhost:9999/")],
            settings(),
            &Conventions::default(),
        )
        .unwrap();

        let headers = layer.targets()[0].headers();
        assert_eq!(headers["x-barrage-endpoint"], "http://localhost:9999/");
        assert_eq!(headers["x-barrage-target"], "api");
        assert_eq!(headers["x-barrage-test"], "smoke");
        assert_eq!(headers["x-env"], "canary");
    }

    #[test]
    fn standard_headers_win_over_extras() {
        let settings = LayerOverrides::default()
            .header("x-barrage-test", "spoofed")
            .apply(1, Duration::from_secs(1))
            .unwrap();
        let layer = Layer::build(
            "smoke",
            "api",
            [Endpoint::new("http://localhost/")],
            settings,
            &Conventions::default(),
        )
        .unwrap();

        let values: Vec<_> = layer.targets()[0]
            .headers()
            .get_all("x-barrage-test")
            .iter()
            .collect();
        assert_eq!(values, vec!["smoke"]);
    }

    #[test]
    fn malformed_endpoint_fails_construction() {
        let err = Layer::build(
            "smoke",
            "api",
            [Endpoint::new("http://")],
            settings(),
            &Conventions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadTestError::Construction(ConstructionError::InvalidUrl { .. })
        ));
    }
}
