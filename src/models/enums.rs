use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(CaptureTrigger {
    Interval => "interval",
    Click => "click",
    Manual => "manual",
    Keyboard => "keyboard",
    AppSwitch => "app_switch",
    Other => "other",
});

impl CaptureTrigger {
    /// Lenient decode for stored rows: capture sources may add trigger
    /// kinds this crate does not know yet.
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or(Self::Other)
    }
}

str_enum!(AnalysisSource {
    Ai => "ai",
    AiFallbackText => "ai_fallback_text",
    HeuristicFallback => "heuristic_fallback",
});

str_enum!(ProcessingStatus {
    Completed => "completed",
    Degraded => "degraded",
});

str_enum!(AnalysisType {
    Vision => "vision",
    Aggregate => "aggregate",
    Auto => "auto",
});
