pub mod insights;

pub use insights::{
    ContextConfig, GeneratorConfig, GeneratorMode, InsightConfig, LanguageFallback,
    SchedulerConfig, SignalConfig, TriggerConfig,
};
