use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$(Self::$variant),+]
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

str_enum!(ProcessingStatus {
    NotStarted => "NOT_STARTED",
    Started => "STARTED",
    Succeeded => "SUCCEEDED",
    Failed => "FAILED",
});

str_enum!(RenditionFormat {
    Structured => "structured",
    Markup => "markup",
    Visual => "visual",
});

str_enum!(ExportStage {
    Setup => "SETUP",
    MasterOrigins => "MASTER_ORIGINS",
    MasterCustomers => "MASTER_CUSTOMERS",
    MasterProducts => "MASTER_PRODUCTS",
    InvoiceBatches => "INVOICE_BATCHES",
});

impl ExportStage {
    /// Passes run when none are configured. SETUP wipes reconciled output,
    /// so it only runs when asked for explicitly.
    pub fn resumable() -> Vec<Self> {
        Self::all()
            .iter()
            .copied()
            .filter(|stage| *stage != Self::Setup)
            .collect()
    }
}

str_enum!(GlossaryDimension {
    Origin => "origin",
    Customer => "customer",
    Product => "product",
});

str_enum!(InconsistencyLevel {
    None => "NONE",
    Minor => "MINOR",
    Major => "MAJOR",
    Severe => "SEVERE",
});

impl InconsistencyLevel {
    /// Lenient parse for model output: unknown or blank values count as NONE.
    pub fn from_loose(value: &str) -> Self {
        value
            .trim()
            .to_ascii_uppercase()
            .parse()
            .unwrap_or(Self::None)
    }
}

/// Kind of value a registry column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Status,
    Reference,
}

str_enum!(RegistryField {
    ConversionStatus => "conversion_status",
    StructuredRef => "structured_ref",
    MarkupRef => "markup_ref",
    VisualRef => "visual_ref",
    ExtractionStatus => "extraction_status",
});

impl RegistryField {
    /// Fixed column number in the registry layout. Columns 1-4 are position,
    /// name, modified date and source reference.
    pub fn column_number(&self) -> usize {
        match self {
            Self::ConversionStatus => 5,
            Self::StructuredRef => 6,
            Self::MarkupRef => 7,
            Self::VisualRef => 8,
            Self::ExtractionStatus => 9,
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::ConversionStatus | Self::ExtractionStatus => FieldKind::Status,
            Self::StructuredRef | Self::MarkupRef | Self::VisualRef => FieldKind::Reference,
        }
    }

    /// Registry column that stores the reference for a rendition format.
    pub fn for_rendition(format: RenditionFormat) -> Self {
        match format {
            RenditionFormat::Structured => Self::StructuredRef,
            RenditionFormat::Markup => Self::MarkupRef,
            RenditionFormat::Visual => Self::VisualRef,
        }
    }
}
