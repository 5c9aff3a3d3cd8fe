use std::env;

/// Process-wide configuration, built once at startup and handed by reference
/// into the pipeline and phase runner. Read-mostly; never mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Below this score a result is considered to need another phase.
    pub confidence_threshold: f32,
    pub phases: PhaseFlags,
    /// No generative-model credentials present. All model calls return
    /// clearly-labeled synthetic responses instead of failing requests.
    pub demo_mode: bool,
    pub max_images: usize,
}

/// Per-phase gates for the identification fallback chain. Phase 1 is always
/// on; each later phase can be disabled independently.
#[derive(Debug, Clone, Copy)]
pub struct PhaseFlags {
    pub enhanced_prompt: bool,
    pub alt_model: bool,
    pub browser_automation: bool,
}

impl Default for PhaseFlags {
    fn default() -> Self {
        Self {
            enhanced_prompt: true,
            alt_model: true,
            browser_automation: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            phases: PhaseFlags::default(),
            demo_mode: true,
            max_images: 6,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let demo_mode = env::var("GEMINI_API_KEY")
            .map(|v| v.trim().is_empty())
            .unwrap_or(true);
        Self {
            confidence_threshold: env_f32("CONFIDENCE_THRESHOLD", 0.7).clamp(0.0, 1.0),
            phases: PhaseFlags {
                enhanced_prompt: env_bool("PHASE_ENHANCED_ENABLED", true),
                alt_model: env_bool("PHASE_ALT_MODEL_ENABLED", true),
                browser_automation: env_bool("PHASE_BROWSER_ENABLED", false),
            },
            demo_mode,
            max_images: env::var("MAX_IMAGES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v >= 1)
                .unwrap_or(6),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_demo_safe() {
        let config = AppConfig::default();
        assert!(config.demo_mode);
        assert!((config.confidence_threshold - 0.7).abs() < f32::EPSILON);
        assert!(config.phases.enhanced_prompt);
        assert!(!config.phases.browser_automation);
    }
}
