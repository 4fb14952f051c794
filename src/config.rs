//! Session timing policy: declared token lifetime, renewal threshold, and refresh debounce.
//!
//! Policies are built through [`SessionPolicy::builder`] (validated) or decoded from JSON with
//! millisecond fields so hosts can ship them alongside the rest of their settings:
//!
//! ```json
//! { "accessTokenLifetimeMs": 900000, "renewalThresholdMs": 60000, "refreshDebounceMs": 1000 }
//! ```

// self
use crate::{_prelude::*, error::ConfigError};

/// Timing knobs shared by the coordinator and its single-flight gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy", into = "RawPolicy")]
pub struct SessionPolicy {
	/// Declared access-token lifetime.
	pub access_token_lifetime: Duration,
	/// Renew once the remaining lifetime falls below this.
	pub renewal_threshold: Duration,
	/// Minimum gap between the end of one renewal and the start of the next.
	pub refresh_debounce: Duration,
}
impl SessionPolicy {
	/// 15 minutes.
	pub const DEFAULT_LIFETIME: Duration = Duration::minutes(15);
	/// 1 minute.
	pub const DEFAULT_THRESHOLD: Duration = Duration::minutes(1);
	/// 1 second.
	pub const DEFAULT_DEBOUNCE: Duration = Duration::seconds(1);

	/// Starts a validated builder seeded with the defaults.
	pub fn builder() -> SessionPolicyBuilder {
		SessionPolicyBuilder { policy: Self::default() }
	}

	/// Portion of the lifetime during which the token counts as fresh.
	pub fn fresh_window(&self) -> Duration {
		self.access_token_lifetime - self.renewal_threshold
	}

	/// Decodes a policy from JSON, reporting the failing field path.
	pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(payload);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::PolicyParse { source })
	}

	fn validate(self) -> Result<Self, ConfigError> {
		if !self.access_token_lifetime.is_positive() {
			return Err(ConfigError::NonPositiveDuration { field: "access_token_lifetime" });
		}
		if self.renewal_threshold.is_negative() {
			return Err(ConfigError::NonPositiveDuration { field: "renewal_threshold" });
		}
		if self.refresh_debounce.is_negative() {
			return Err(ConfigError::NonPositiveDuration { field: "refresh_debounce" });
		}
		if self.renewal_threshold >= self.access_token_lifetime {
			return Err(ConfigError::ThresholdExceedsLifetime {
				lifetime: self.access_token_lifetime,
				threshold: self.renewal_threshold,
			});
		}

		Ok(self)
	}
}
impl Default for SessionPolicy {
	fn default() -> Self {
		Self {
			access_token_lifetime: Self::DEFAULT_LIFETIME,
			renewal_threshold: Self::DEFAULT_THRESHOLD,
			refresh_debounce: Self::DEFAULT_DEBOUNCE,
		}
	}
}

/// Builder for [`SessionPolicy`].
#[derive(Clone, Debug)]
pub struct SessionPolicyBuilder {
	policy: SessionPolicy,
}
impl SessionPolicyBuilder {
	/// Sets the declared access-token lifetime.
	pub fn access_token_lifetime(mut self, lifetime: Duration) -> Self {
		self.policy.access_token_lifetime = lifetime;

		self
	}

	/// Sets the renewal threshold.
	pub fn renewal_threshold(mut self, threshold: Duration) -> Self {
		self.policy.renewal_threshold = threshold;

		self
	}

	/// Sets the debounce window; zero disables debouncing.
	pub fn refresh_debounce(mut self, debounce: Duration) -> Self {
		self.policy.refresh_debounce = debounce;

		self
	}

	/// Validates and returns the policy.
	pub fn build(self) -> Result<SessionPolicy, ConfigError> {
		self.policy.validate()
	}
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawPolicy {
	#[serde(default = "RawPolicy::default_lifetime")]
	access_token_lifetime_ms: i64,
	#[serde(default = "RawPolicy::default_threshold")]
	renewal_threshold_ms: i64,
	#[serde(default = "RawPolicy::default_debounce")]
	refresh_debounce_ms: i64,
}
impl RawPolicy {
	fn default_lifetime() -> i64 {
		SessionPolicy::DEFAULT_LIFETIME.whole_milliseconds() as i64
	}

	fn default_threshold() -> i64 {
		SessionPolicy::DEFAULT_THRESHOLD.whole_milliseconds() as i64
	}

	fn default_debounce() -> i64 {
		SessionPolicy::DEFAULT_DEBOUNCE.whole_milliseconds() as i64
	}
}
impl TryFrom<RawPolicy> for SessionPolicy {
	type Error = ConfigError;

	fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
		SessionPolicy {
			access_token_lifetime: Duration::milliseconds(raw.access_token_lifetime_ms),
			renewal_threshold: Duration::milliseconds(raw.renewal_threshold_ms),
			refresh_debounce: Duration::milliseconds(raw.refresh_debounce_ms),
		}
		.validate()
	}
}
impl From<SessionPolicy> for RawPolicy {
	fn from(policy: SessionPolicy) -> Self {
		Self {
			access_token_lifetime_ms: policy.access_token_lifetime.whole_milliseconds() as i64,
			renewal_threshold_ms: policy.renewal_threshold.whole_milliseconds() as i64,
			refresh_debounce_ms: policy.refresh_debounce.whole_milliseconds() as i64,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_fifteen_minute_tokens() {
		let policy = SessionPolicy::default();

		assert_eq!(policy.access_token_lifetime, Duration::minutes(15));
		assert_eq!(policy.renewal_threshold, Duration::minutes(1));
		assert_eq!(policy.refresh_debounce, Duration::seconds(1));
		assert_eq!(policy.fresh_window(), Duration::minutes(14));
	}

	#[test]
	fn builder_rejects_inverted_threshold() {
		let err = SessionPolicy::builder()
			.access_token_lifetime(Duration::minutes(1))
			.renewal_threshold(Duration::minutes(2))
			.build()
			.expect_err("Threshold longer than the lifetime must be rejected.");

		assert!(matches!(err, ConfigError::ThresholdExceedsLifetime { .. }));

		let err = SessionPolicy::builder()
			.refresh_debounce(Duration::seconds(-1))
			.build()
			.expect_err("Negative debounce must be rejected.");

		assert!(matches!(err, ConfigError::NonPositiveDuration { field: "refresh_debounce" }));
	}

	#[test]
	fn json_uses_millisecond_fields_and_defaults() {
		let policy = SessionPolicy::from_json(r#"{"accessTokenLifetimeMs":300000}"#)
			.expect("Partial policy should fall back to defaults.");

		assert_eq!(policy.access_token_lifetime, Duration::minutes(5));
		assert_eq!(policy.renewal_threshold, Duration::minutes(1));

		let err = SessionPolicy::from_json(r#"{"renewalThresholdMs":"soon"}"#)
			.expect_err("Non-numeric fields must be rejected.");

		assert!(err.to_string().contains("could not be parsed"));
		assert!(SessionPolicy::from_json(r#"{"renewalThresholdMs":900000}"#).is_err());
	}
}
