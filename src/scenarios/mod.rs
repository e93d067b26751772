//! The scripted user journeys, numbered as in the acceptance catalog.
//!
//! Every scenario assumes [`fixture::bootstrap`] already produced an
//! authenticated session (except [`ScenarioId::InvalidLogin`], which must
//! start logged out) and reports its own pass/fail independently.

pub mod fixture;
pub mod nav_pack;
pub mod navigation;
pub mod trial_balance;
pub mod utility;

use crate::browser::Session;
use crate::core::{PageDriver, TestData};
use crate::errors::{E2eError, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How long the View Report button may take to render on a busy form.
pub const VIEW_BUTTON_TIMEOUT: Duration = Duration::from_secs(300);

/// What a passing scenario leaves behind for the run report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Evidence {
    pub notes: Vec<String>,
    pub artifacts: Vec<PathBuf>,
}

impl Evidence {
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn artifact(mut self, path: Option<PathBuf>) -> Self {
        self.artifacts.extend(path);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScenarioId {
    ArrowButtonNavigation,
    LiveReportsTabAccess,
    AccountingSectionExpansion,
    NavPackBasicValidation,
    NavPackNoClientSelected,
    NavPackClientSelection,
    NavPackFundSelection,
    NavPackDateModeSelection,
    NavPackDateEntry,
    NavPackEndToEnd,
    NavPackDataIntegrity,
    TrialBalanceNavigation,
    TrialBalanceSectionVisibility,
    TrialBalanceDataLoading,
    TrialBalanceFundSelection,
    TrialBalanceEndToEnd,
    RefreshStability,
    ExcelExportIntegrity,
    InvalidLogin,
}

impl ScenarioId {
    const CATALOG: [ScenarioId; 19] = [
        ScenarioId::ArrowButtonNavigation,
        ScenarioId::LiveReportsTabAccess,
        ScenarioId::AccountingSectionExpansion,
        ScenarioId::NavPackBasicValidation,
        ScenarioId::NavPackNoClientSelected,
        ScenarioId::NavPackClientSelection,
        ScenarioId::NavPackFundSelection,
        ScenarioId::NavPackDateModeSelection,
        ScenarioId::NavPackDateEntry,
        ScenarioId::NavPackEndToEnd,
        ScenarioId::NavPackDataIntegrity,
        ScenarioId::TrialBalanceNavigation,
        ScenarioId::TrialBalanceSectionVisibility,
        ScenarioId::TrialBalanceDataLoading,
        ScenarioId::TrialBalanceFundSelection,
        ScenarioId::TrialBalanceEndToEnd,
        ScenarioId::RefreshStability,
        ScenarioId::ExcelExportIntegrity,
        ScenarioId::InvalidLogin,
    ];

    /// The eighteen portal scenarios, in catalog order.
    pub fn all() -> &'static [ScenarioId] {
        &Self::CATALOG[..18]
    }

    /// The portal scenarios plus the credential-rejection check.
    pub fn extended() -> &'static [ScenarioId] {
        &Self::CATALOG
    }

    pub fn from_number(number: u32) -> Option<Self> {
        Self::CATALOG.iter().copied().find(|s| s.number() == number)
    }

    pub fn number(self) -> u32 {
        Self::CATALOG
            .iter()
            .position(|s| *s == self)
            .map_or(0, |index| index as u32 + 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            ScenarioId::ArrowButtonNavigation => "Verify Arrow Button Navigation",
            ScenarioId::LiveReportsTabAccess => "Verify Live Reports Tab Access",
            ScenarioId::AccountingSectionExpansion => "Verify Accounting Section Expansion",
            ScenarioId::NavPackBasicValidation => "NAV Pack Report - Basic Page Validation",
            ScenarioId::NavPackNoClientSelected => {
                "NAV Pack Report - Error Handling (No Client Selected)"
            }
            ScenarioId::NavPackClientSelection => {
                "NAV Pack Report - Client Selection Functionality"
            }
            ScenarioId::NavPackFundSelection => "NAV Pack Report - Fund Selection Functionality",
            ScenarioId::NavPackDateModeSelection => "NAV Pack Report - Date Mode Selection",
            ScenarioId::NavPackDateEntry => "NAV Pack Report - Date Entry Functionality",
            ScenarioId::NavPackEndToEnd => "NAV Pack Report - Complete End-to-End Flow",
            ScenarioId::NavPackDataIntegrity => "NAV Pack Report - Data Validation and Integrity",
            ScenarioId::TrialBalanceNavigation => "Trial Balance - Navigation and Access",
            ScenarioId::TrialBalanceSectionVisibility => {
                "Trial Balance - Section Visibility and Interface"
            }
            ScenarioId::TrialBalanceDataLoading => "Trial Balance - Data Loading and Display",
            ScenarioId::TrialBalanceFundSelection => "Trial Balance - Fund Selection Functionality",
            ScenarioId::TrialBalanceEndToEnd => "Trial Balance - Complete End-to-End Workflow",
            ScenarioId::RefreshStability => "Page Refresh Functionality and Stability",
            ScenarioId::ExcelExportIntegrity => "Excel File Export and Data Integrity Validation",
            ScenarioId::InvalidLogin => "Login Rejects Invalid Credentials",
        }
    }

    pub fn objective(self) -> &'static str {
        match self {
            ScenarioId::ArrowButtonNavigation => {
                "Main navigation arrow button is visible, enabled and clickable"
            }
            ScenarioId::LiveReportsTabAccess => {
                "Live Reports tab is reachable after opening the reports menu"
            }
            ScenarioId::AccountingSectionExpansion => {
                "Accounting section expands to show its report options"
            }
            ScenarioId::NavPackBasicValidation => {
                "NAV Pack Report page shows its title, form fields and View Report button"
            }
            ScenarioId::NavPackNoClientSelected => {
                "View Report without a client is handled without breaking the form"
            }
            ScenarioId::NavPackClientSelection => "Client combobox accepts the test client",
            ScenarioId::NavPackFundSelection => "Fund combobox accepts a fund once a client is set",
            ScenarioId::NavPackDateModeSelection => "Date Mode select accepts AccountingDate",
            ScenarioId::NavPackDateEntry => "Start and end date fields accept the test dates",
            ScenarioId::NavPackEndToEnd => "Form filling, report generation and export all succeed",
            ScenarioId::NavPackDataIntegrity => {
                "Generated report shows the client and balance figures"
            }
            ScenarioId::TrialBalanceNavigation => {
                "Accounting reports are reachable from the dashboard"
            }
            ScenarioId::TrialBalanceSectionVisibility => {
                "Accounting section renders and can be captured for audit"
            }
            ScenarioId::TrialBalanceDataLoading => {
                "Trial Balance report renders at least one data row"
            }
            ScenarioId::TrialBalanceFundSelection => {
                "Trial Balance fund select accepts the test fund"
            }
            ScenarioId::TrialBalanceEndToEnd => {
                "Fund selection, report generation and export all succeed"
            }
            ScenarioId::RefreshStability => "A reload keeps the report page usable and error-free",
            ScenarioId::ExcelExportIntegrity => {
                "Exported report is a non-empty .xlsx or .xls file"
            }
            ScenarioId::InvalidLogin => "Wrong credentials never reach the authenticated dashboard",
        }
    }

    /// Whether the session must be authenticated before the body runs.
    pub fn requires_login(self) -> bool {
        !matches!(self, ScenarioId::InvalidLogin)
    }

    pub async fn run<D: PageDriver>(
        self,
        session: &Session<D>,
        data: &TestData,
    ) -> Result<Evidence> {
        match self {
            ScenarioId::ArrowButtonNavigation => navigation::arrow_button(session).await,
            ScenarioId::LiveReportsTabAccess => navigation::live_reports_tab(session).await,
            ScenarioId::AccountingSectionExpansion => navigation::accounting_section(session).await,
            ScenarioId::NavPackBasicValidation => nav_pack::basic_validation(session).await,
            ScenarioId::NavPackNoClientSelected => nav_pack::no_client_selected(session).await,
            ScenarioId::NavPackClientSelection => nav_pack::client_selection(session, data).await,
            ScenarioId::NavPackFundSelection => nav_pack::fund_selection(session, data).await,
            ScenarioId::NavPackDateModeSelection => {
                nav_pack::date_mode_selection(session, data).await
            }
            ScenarioId::NavPackDateEntry => nav_pack::date_entry(session, data).await,
            ScenarioId::NavPackEndToEnd => nav_pack::end_to_end(session, data).await,
            ScenarioId::NavPackDataIntegrity => nav_pack::data_integrity(session, data).await,
            ScenarioId::TrialBalanceNavigation => trial_balance::navigation(session).await,
            ScenarioId::TrialBalanceSectionVisibility => {
                trial_balance::section_visibility(session).await
            }
            ScenarioId::TrialBalanceDataLoading => trial_balance::data_loading(session).await,
            ScenarioId::TrialBalanceFundSelection => {
                trial_balance::fund_selection(session, data).await
            }
            ScenarioId::TrialBalanceEndToEnd => trial_balance::end_to_end(session, data).await,
            ScenarioId::RefreshStability => utility::refresh_stability(session).await,
            ScenarioId::ExcelExportIntegrity => {
                utility::excel_export_integrity(session, data).await
            }
            ScenarioId::InvalidLogin => utility::invalid_login(session).await,
        }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SCENARIO {}: {}", self.number(), self.title())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = E2eError;

    fn from_str(raw: &str) -> Result<Self> {
        raw.trim()
            .parse::<u32>()
            .ok()
            .and_then(Self::from_number)
            .ok_or_else(|| E2eError::ConfigurationError(format!("unknown scenario {:?}", raw)))
    }
}
