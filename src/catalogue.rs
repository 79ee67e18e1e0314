//! Fixed disclosure catalogues and tracked metrics.
//!
//! Catalogues are plain tables so the 11-item TCFD set and the 4-item legacy
//! set run through the same extraction and assembly code.

use std::str::FromStr;

use anyhow::anyhow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pillar {
    Governance,
    Strategy,
    RiskManagement,
    MetricsAndTargets,
}

impl Pillar {
    pub const ALL: [Pillar; 4] = [
        Pillar::Governance,
        Pillar::Strategy,
        Pillar::RiskManagement,
        Pillar::MetricsAndTargets,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Pillar::Governance => "1. Governance",
            Pillar::Strategy => "2. Strategy",
            Pillar::RiskManagement => "3. Risk Management",
            Pillar::MetricsAndTargets => "4. Metrics and Targets",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Pillar::Governance => {
                "Disclosing the organization’s governance around climate-related risks and opportunities."
            }
            Pillar::Strategy => {
                "Disclosing the actual and potential impacts of climate-related risks and opportunities on the organization’s businesses, strategy, and financial planning."
            }
            Pillar::RiskManagement => {
                "Disclosing how the organization identifies, assesses, and manages climate-related risks."
            }
            Pillar::MetricsAndTargets => {
                "Disclosing the metrics and targets used to assess and manage relevant climate-related risks and opportunities."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disclosure {
    /// Key the narrative answer is stored under.
    pub id: &'static str,
    pub pillar: Pillar,
    /// Subsection heading in the assembled prompt, including its letter.
    pub heading: &'static str,
    pub question: &'static str,
    /// The tracked metrics block is rendered right after this disclosure.
    pub carries_metrics: bool,
}

const fn disclosure(
    id: &'static str,
    pillar: Pillar,
    heading: &'static str,
    question: &'static str,
) -> Disclosure {
    Disclosure {
        id,
        pillar,
        heading,
        question,
        carries_metrics: false,
    }
}

pub static TCFD_DISCLOSURES: [Disclosure; 11] = [
    disclosure(
        "Governance a) Board's oversight",
        Pillar::Governance,
        "a) Board’s Oversight",
        "Describe the board’s oversight of climate-related risks and opportunities.",
    ),
    disclosure(
        "Governance b) Management's role",
        Pillar::Governance,
        "b) Management’s Role",
        "Describe management’s role in assessing and managing climate-related risks and opportunities.",
    ),
    disclosure(
        "Strategy a) Identified risks and opportunities",
        Pillar::Strategy,
        "a) Identified Risks and Opportunities",
        "Describe the climate-related risks and opportunities the organization has identified over the short, medium, and long term.",
    ),
    disclosure(
        "Strategy b) Impact on organization",
        Pillar::Strategy,
        "b) Impact on Business, Strategy, and Financial Planning",
        "Describe the impact of climate-related risks and opportunities on the organization’s businesses, strategy, and financial planning.",
    ),
    disclosure(
        "Strategy c) Resilience of strategy",
        Pillar::Strategy,
        "c) Resilience of Strategy (Scenario Analysis)",
        "Describe the resilience of the organization’s strategy, taking into consideration different climate-related scenarios, including a 2°C or lower scenario.",
    ),
    disclosure(
        "Risk Management a) Risk identification processes",
        Pillar::RiskManagement,
        "a) Risk Identification and Assessment Processes",
        "Describe the organization’s processes for identifying and assessing climate-related risks.",
    ),
    disclosure(
        "Risk Management b) Risk management processes",
        Pillar::RiskManagement,
        "b) Risk Management Processes",
        "Describe the organization’s processes for managing climate-related risks.",
    ),
    disclosure(
        "Risk Management c) Integration into overall risk management",
        Pillar::RiskManagement,
        "c) Integration into Overall Risk Management",
        "Describe how processes for identifying, assessing, and managing climate-related risks are integrated into the organization’s overall risk management.",
    ),
    disclosure(
        "Metrics and Targets a) Metrics used",
        Pillar::MetricsAndTargets,
        "a) Metrics Used for Assessment",
        "Disclose the metrics used by the organization to assess climate-related risks and opportunities.",
    ),
    Disclosure {
        carries_metrics: true,
        ..disclosure(
            "Metrics and Targets b) GHG Emissions",
            Pillar::MetricsAndTargets,
            "b) Greenhouse Gas (GHG) Emissions",
            "Disclose Scope 1, Scope 2, and, if appropriate, Scope 3 greenhouse gas (GHG) emissions, and the related risks.",
        )
    },
    disclosure(
        "Metrics and Targets c) Targets used",
        Pillar::MetricsAndTargets,
        "c) Targets and Performance",
        "Describe the targets used by the organization to manage climate-related risks and opportunities and performance against targets.",
    ),
];

pub static LEGACY_DISCLOSURES: [Disclosure; 4] = [
    disclosure(
        "Governance",
        Pillar::Governance,
        "a) Governance Overview",
        "Describe the organization’s governance around climate-related risks and opportunities, including board oversight and management’s role.",
    ),
    disclosure(
        "Strategy",
        Pillar::Strategy,
        "a) Strategy Overview",
        "Describe the climate-related risks and opportunities the organization has identified and their impact on its businesses, strategy, and financial planning.",
    ),
    disclosure(
        "Risk Management",
        Pillar::RiskManagement,
        "a) Risk Management Overview",
        "Describe how the organization identifies, assesses, and manages climate-related risks.",
    ),
    Disclosure {
        carries_metrics: true,
        ..disclosure(
            "Metrics and Targets",
            Pillar::MetricsAndTargets,
            "a) Metrics, Emissions, and Targets",
            "Disclose the metrics and targets used to assess and manage climate-related risks and opportunities, including Scope 1 and Scope 2 GHG emissions.",
        )
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogueVariant {
    #[default]
    Tcfd,
    Legacy,
}

impl CatalogueVariant {
    pub fn disclosures(&self) -> &'static [Disclosure] {
        match self {
            CatalogueVariant::Tcfd => &TCFD_DISCLOSURES,
            CatalogueVariant::Legacy => &LEGACY_DISCLOSURES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogueVariant::Tcfd => "tcfd",
            CatalogueVariant::Legacy => "legacy",
        }
    }
}

impl FromStr for CatalogueVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tcfd" => Ok(CatalogueVariant::Tcfd),
            "legacy" => Ok(CatalogueVariant::Legacy),
            other => Err(anyhow!("unknown disclosure catalogue '{other}'")),
        }
    }
}

/// Extra question asked only when no metrics table was uploaded.
pub const QUANTITATIVE_QUESTION_ID: &str = "Quantitative Data (if available)";

pub const QUANTITATIVE_QUESTION: &str = "Find the following key metrics for the most recent reporting year in the text. \
Provide only the numerical value. If a metric is not found, return 'Not available'.\n\
- Scope 1 GHG Emissions (in million tCO2e):\n\
- Scope 2 GHG Emissions (in million tCO2e):\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub key: &'static str,
    /// Substring searched in the label column of the metrics sheet.
    pub row_label: &'static str,
    /// Substring searched in the quantitative narrative answer.
    pub narrative_marker: Option<&'static str>,
    pub unit: &'static str,
}

pub static TRACKED_METRICS: [MetricSpec; 3] = [
    MetricSpec {
        key: "Scope 1 GHG Emissions",
        row_label: "Direct (Scope 1) GHG emissions",
        narrative_marker: Some("Scope 1"),
        unit: "million tCO2e",
    },
    MetricSpec {
        key: "Scope 2 GHG Emissions",
        row_label: "Indirect (Scope 2) GHG emissions",
        narrative_marker: Some("Scope 2"),
        unit: "million tCO2e",
    },
    MetricSpec {
        key: "Total Water Withdrawal",
        row_label: "Total water withdrawal",
        narrative_marker: None,
        unit: "million m3",
    },
];
