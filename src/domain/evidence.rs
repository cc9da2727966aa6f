use serde::Serialize;

/// Ordered, append-only list of short `component:event` markers recording
/// which components and branches ran during a single request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceTrail(Vec<String>);

impl EvidenceTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, marker: impl Into<String>) {
        self.0.push(marker.into());
    }

    pub fn push_timing(&mut self, component: &str, seconds: f64) {
        self.0
            .push(format!("{component}_processing_time_{seconds:.1}s"));
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn extend(&mut self, other: &EvidenceTrail) {
        self.0.extend(other.0.iter().cloned());
    }

    /// The evidence list at stage n+1 must be a prefix-containing
    /// extension of stage n's.
    pub fn is_extension_of(&self, prior: &EvidenceTrail) -> bool {
        self.0.len() >= prior.0.len() && self.0[..prior.0.len()] == prior.0[..]
    }

    /// Clones the trail and appends the formatter's three timing lines
    /// (`*_processing_time_X.Xs`), leaving the original untouched.
    pub fn clone_with_timings(&self, intent_secs: f64, location_secs: f64, service_secs: f64) -> Self {
        let mut trail = self.clone();
        trail.push_timing("intent", intent_secs);
        trail.push_timing("location", location_secs);
        trail.push_timing("service", service_secs);
        trail
    }
}
