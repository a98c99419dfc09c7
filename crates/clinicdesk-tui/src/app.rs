//! Application state management for clinicdesk.
//!
//! This module contains the core `App` struct: which screen is showing, what
//! the route guard decided for it, the loaded pages of patients and
//! appointments, open forms, and the channel that background API calls
//! report back on.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use clinicdesk_core::api::{ApiClient, ApiError};
use clinicdesk_core::auth::{
    CredentialStore, GuardDecision, LoginFlow, LoginForm, LoginOutcome, Route, RouteGuard,
    Session, SessionStatus,
};
use clinicdesk_core::config::{Config, ENV_PASSWORD, ENV_USERNAME};
use clinicdesk_core::models::{
    Appointment, AppointmentForm, FieldError, Page, PageRequest, Patient, PatientForm,
    APPOINTMENT_PAGE_SIZES, PATIENT_PAGE_SIZES,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    ShowingHelp,
    EditingPatient,
    EditingAppointment,
    ConfirmingDelete,
    ConfirmingLogout,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Username,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Button,
            LoginFocus::Password => LoginFocus::Username,
            LoginFocus::Button => LoginFocus::Password,
        }
    }
}

/// Text fields of an add/edit modal
pub trait EditableForm {
    fn labels() -> &'static [&'static str];
    fn value(&self, index: usize) -> &str;
    fn value_mut(&mut self, index: usize) -> Option<&mut String>;
}

impl EditableForm for PatientForm {
    fn labels() -> &'static [&'static str] {
        &Self::FIELDS
    }

    fn value(&self, index: usize) -> &str {
        self.field(index)
    }

    fn value_mut(&mut self, index: usize) -> Option<&mut String> {
        self.field_mut(index)
    }
}

impl EditableForm for AppointmentForm {
    fn labels() -> &'static [&'static str] {
        &Self::FIELDS
    }

    fn value(&self, index: usize) -> &str {
        self.field(index)
    }

    fn value_mut(&mut self, index: usize) -> Option<&mut String> {
        self.field_mut(index)
    }
}

/// An open modal form: its text, focused field and last validation errors.
#[derive(Debug, Clone)]
pub struct FormState<F> {
    pub form: F,
    pub focus: usize,
    pub errors: Vec<FieldError>,
    /// Id of the record being edited; `None` when adding
    pub original_id: Option<i64>,
}

impl<F: EditableForm> FormState<F> {
    pub fn new(form: F, original_id: Option<i64>) -> Self {
        Self {
            form,
            focus: 0,
            errors: Vec::new(),
            original_id,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.original_id.is_some()
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % F::labels().len();
    }

    pub fn prev_field(&mut self) {
        let len = F::labels().len();
        self.focus = (self.focus + len - 1) % len;
    }

    pub fn is_last_field(&self) -> bool {
        self.focus + 1 == F::labels().len()
    }

    pub fn push_char(&mut self, c: char) {
        if c.is_control() {
            return;
        }
        if let Some(value) = self.form.value_mut(self.focus) {
            value.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(value) = self.form.value_mut(self.focus) {
            value.pop();
        }
    }
}

/// What the delete confirmation will remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Patients(Vec<i64>),
    Appointment(i64),
}

#[derive(Debug)]
pub struct PatientsView {
    pub page: Page<Patient>,
    pub request: PageRequest,
    pub selection: usize,
    /// Rows ticked for bulk delete
    pub marked: BTreeSet<i64>,
    pub loaded: bool,
    pub loading: bool,
}

impl PatientsView {
    fn new(page_size: u32) -> Self {
        Self {
            page: Page::default(),
            request: PageRequest::new(0, page_size),
            selection: 0,
            marked: BTreeSet::new(),
            loaded: false,
            loading: false,
        }
    }

    pub fn page_count(&self) -> u64 {
        self.page.page_count(self.request.page_size)
    }
}

#[derive(Debug)]
pub struct AppointmentsView {
    pub page: Page<Appointment>,
    pub request: PageRequest,
    pub selection: usize,
    /// Calendar filter; `None` shows every appointment on the page
    pub filter_day: Option<NaiveDate>,
    /// Day highlighted in the calendar
    pub cursor_day: NaiveDate,
    pub loaded: bool,
    pub loading: bool,
}

impl AppointmentsView {
    fn new(page_size: u32) -> Self {
        Self {
            page: Page::default(),
            request: PageRequest::new(0, page_size),
            selection: 0,
            filter_day: None,
            cursor_day: Local::now().date_naive(),
            loaded: false,
            loading: false,
        }
    }

    pub fn page_count(&self) -> u64 {
        self.page.page_count(self.request.page_size)
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent from spawned API calls back to the main loop.
enum DataResult {
    /// A page of patients for the given request
    Patients(PageRequest, Page<Patient>),
    /// A page of appointments for the given request
    Appointments(PageRequest, Page<Appointment>),
    /// A create/update/delete finished; refetch `route`
    Saved { route: Route, message: String },
    /// Any call failed; `what` prefixes the status message. `generation` is
    /// the session generation the call was issued under.
    Failed {
        what: String,
        error: ApiError,
        generation: u64,
    },
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub config: Config,
    api: ApiClient,
    pub session: Session,
    guard: RouteGuard,
    login_flow: LoginFlow,

    // Navigation
    pub state: AppState,
    pub route: Route,
    pub decision: GuardDecision,
    /// Storage failed; nothing else can work
    pub fatal_error: Option<String>,

    // Login form state
    pub login_form: LoginForm,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Screens
    pub search_query: String,
    pub patients: PatientsView,
    pub appointments: AppointmentsView,
    pub patient_form: Option<FormState<PatientForm>>,
    pub appointment_form: Option<FormState<AppointmentForm>>,
    pub pending_delete: Option<DeleteTarget>,

    // Background task channel
    data_rx: mpsc::Receiver<DataResult>,
    data_tx: mpsc::Sender<DataResult>,

    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let api = ApiClient::from_config(&config)?;
        debug!(base_url = %config.api_base_url, "API client configured");

        let shared = Arc::new(api.clone());
        let session = Session::new(Arc::clone(&store), shared.clone());
        let guard = RouteGuard::new(store);
        let login_flow = LoginFlow::new(shared);

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        // Get credentials from env vars or config
        let username = std::env::var(ENV_USERNAME)
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();
        let password = std::env::var(ENV_PASSWORD).unwrap_or_default();

        let page_size = config.default_page_size;

        Ok(Self {
            config,
            api,
            session,
            guard,
            login_flow,

            state: AppState::Normal,
            route: Route::Login,
            decision: GuardDecision::Loading,
            fatal_error: None,

            login_form: LoginForm::new(username, password),
            login_focus: LoginFocus::Username,
            login_error: None,

            search_query: String::new(),
            patients: PatientsView::new(page_size),
            appointments: AppointmentsView::new(page_size),
            patient_form: None,
            appointment_form: None,
            pending_delete: None,

            data_rx: rx,
            data_tx: tx,

            status_message: None,
        })
    }

    /// Read the stored token and head for the remembered (or default) screen.
    pub fn start(&mut self) {
        if let Err(e) = self.boot() {
            self.fail(e);
        }
    }

    fn boot(&mut self) -> Result<()> {
        let status = self.session.boot()?;
        info!(status = status.label(), "Session booted");
        let intended = self.guard.remembered()?.unwrap_or(Route::DEFAULT_LANDING);
        self.navigate(intended)
    }

    /// Switch screens, reporting storage failures as fatal.
    pub fn go_to(&mut self, route: Route) {
        if let Err(e) = self.navigate(route) {
            self.fail(e);
        }
    }

    pub fn navigate(&mut self, route: Route) -> Result<()> {
        if self.route != route {
            debug!(from = self.route.path(), to = route.path(), "Navigating");
            self.search_query.clear();
        }
        self.route = route;
        self.refresh_guard()
    }

    /// Re-run the route guard for the current screen. Called after every
    /// navigation and every session transition.
    fn refresh_guard(&mut self) -> Result<()> {
        if self.route == Route::Login {
            match self.guard.at_login(self.session.status())? {
                Some(landing) => self.route = landing,
                None => {
                    self.decision = GuardDecision::Render;
                    return Ok(());
                }
            }
        }

        self.decision = self.guard.check(self.session.status(), self.route)?;
        match self.decision {
            GuardDecision::RedirectToLogin { remembered } => {
                info!(route = remembered.path(), "Not signed in, showing login");
                self.api.set_token(None);
                self.route = Route::Login;
                self.decision = GuardDecision::Render;
                self.start_login();
            }
            GuardDecision::Render => {
                self.api.set_token(self.session.token().map(str::to_string));
                self.ensure_loaded();
            }
            GuardDecision::Loading | GuardDecision::Degraded => {}
        }
        Ok(())
    }

    /// Full-screen error; storage is broken.
    pub fn fail(&mut self, e: anyhow::Error) {
        error!(error = %format!("{:#}", e), "Fatal error");
        self.fatal_error = Some(format!("{:#}", e));
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Show the login screen with focus on the first empty field
    pub fn start_login(&mut self) {
        self.state = AppState::Normal;
        self.login_focus = if self.login_form.username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        self.login_error = None;

        let outcome = self
            .login_flow
            .submit(&self.login_form, &mut self.session, &self.guard)
            .await?;

        match outcome {
            LoginOutcome::LoggedIn { landing } => {
                self.config.last_username = Some(self.login_form.username.trim().to_string());
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                self.login_form.clear_password();
                self.clear_data();
                self.status_message = None;
                self.navigate(landing)?;
            }
            other => {
                self.login_error = other.message();
            }
        }
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        self.session.logout()?;
        self.api.set_token(None);
        self.clear_data();
        self.route = Route::Login;
        self.decision = GuardDecision::Render;
        self.status_message = None;
        self.start_login();
        Ok(())
    }

    /// Degraded screen: try the kept token again.
    pub fn retry_session(&mut self) {
        if self.session.retry() {
            self.status_message = Some("Reconnecting...".to_string());
            if let Err(e) = self.refresh_guard() {
                self.fail(e);
            }
        }
    }

    /// A resource call issued under `generation` came back 401/403.
    fn on_rejected(&mut self, generation: u64) -> Result<()> {
        if !self.session.expire_from(generation)? {
            return Ok(());
        }
        self.clear_data();
        self.refresh_guard()?;
        self.login_error = Some(SESSION_EXPIRED_MESSAGE.to_string());
        Ok(())
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    /// Apply finished validations and API results. Called every tick.
    pub fn check_background_tasks(&mut self) {
        match self.session.poll() {
            Ok(true) => {
                if self.session.status() == SessionStatus::Authenticated {
                    self.status_message = None;
                }
                if let Err(e) = self.refresh_guard() {
                    self.fail(e);
                }
            }
            Ok(false) => {}
            Err(e) => self.fail(e),
        }

        while let Ok(result) = self.data_rx.try_recv() {
            self.process_data_result(result);
        }
    }

    async fn send_result(tx: &mpsc::Sender<DataResult>, result: DataResult) {
        if tx.send(result).await.is_err() {
            warn!("App dropped before background result arrived");
        }
    }

    fn process_data_result(&mut self, result: DataResult) {
        match result {
            DataResult::Patients(request, page) => {
                if request != self.patients.request {
                    debug!("Discarding patients page for an old request");
                    return;
                }
                self.patients.loading = false;
                if let Some(back) = request.settle(&page) {
                    self.patients.request = back;
                    self.fetch_patients();
                    return;
                }
                self.patients
                    .marked
                    .retain(|id| page.content.iter().any(|p| p.patient_id == *id));
                self.patients.page = page;
                self.patients.loaded = true;
                self.clamp_selection();
            }
            DataResult::Appointments(request, page) => {
                if request != self.appointments.request {
                    debug!("Discarding appointments page for an old request");
                    return;
                }
                self.appointments.loading = false;
                if let Some(back) = request.settle(&page) {
                    self.appointments.request = back;
                    self.fetch_appointments();
                    return;
                }
                self.appointments.page = page;
                self.appointments.loaded = true;
                self.clamp_selection();
            }
            DataResult::Saved { route, message } => {
                info!(message = %message, "Saved");
                self.status_message = Some(message);
                match route {
                    Route::Patients => self.fetch_patients(),
                    Route::Appointments => self.fetch_appointments(),
                    Route::Login => {}
                }
            }
            DataResult::Failed {
                what,
                error,
                generation,
            } => {
                self.patients.loading = false;
                self.appointments.loading = false;
                if error.is_unauthorized() {
                    if let Err(e) = self.on_rejected(generation) {
                        self.fail(e);
                    }
                    return;
                }
                warn!(error = %error, "{}", what);
                let detail = match error {
                    ApiError::NetworkError(_) => {
                        "network error, check your connection".to_string()
                    }
                    other => other.to_string(),
                };
                self.status_message = Some(format!("{}: {}", what, detail));
            }
        }
    }

    /// Client for background calls, only while the session is confirmed.
    fn authed_api(&self) -> Option<ApiClient> {
        if !self.session.is_valid() {
            return None;
        }
        self.session
            .token()
            .map(|token| self.api.with_token(token.to_string()))
    }

    fn ensure_loaded(&mut self) {
        match self.route {
            Route::Patients if !self.patients.loaded && !self.patients.loading => {
                self.fetch_patients()
            }
            Route::Appointments if !self.appointments.loaded && !self.appointments.loading => {
                self.fetch_appointments()
            }
            _ => {}
        }
    }

    /// Reload the current screen
    pub fn refresh_current(&mut self) {
        match self.route {
            Route::Patients => self.fetch_patients(),
            Route::Appointments => self.fetch_appointments(),
            Route::Login => {}
        }
    }

    pub fn fetch_patients(&mut self) {
        let Some(api) = self.authed_api() else {
            return;
        };
        let generation = self.session.generation();
        let request = self.patients.request;
        self.patients.loading = true;
        let tx = self.data_tx.clone();

        tokio::spawn(async move {
            let result = match api.list_patients(request).await {
                Ok(page) => DataResult::Patients(request, page),
                Err(error) => DataResult::Failed {
                    what: "Failed to fetch patients".to_string(),
                    error,
                    generation,
                },
            };
            Self::send_result(&tx, result).await;
        });
    }

    pub fn fetch_appointments(&mut self) {
        let Some(api) = self.authed_api() else {
            return;
        };
        let generation = self.session.generation();
        let request = self.appointments.request;
        self.appointments.loading = true;
        let tx = self.data_tx.clone();

        tokio::spawn(async move {
            let result = match api.list_appointments(request).await {
                Ok(page) => DataResult::Appointments(request, page),
                Err(error) => DataResult::Failed {
                    what: "Failed to fetch appointments".to_string(),
                    error,
                    generation,
                },
            };
            Self::send_result(&tx, result).await;
        });
    }

    /// Run a create/update/delete in the background; on success the
    /// message goes to the status bar and `route` is refetched.
    fn spawn_mutation<F, Fut>(&self, route: Route, what: &'static str, op: F)
    where
        F: FnOnce(ApiClient) -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, ApiError>> + Send + 'static,
    {
        let Some(api) = self.authed_api() else {
            return;
        };
        let generation = self.session.generation();
        let tx = self.data_tx.clone();

        tokio::spawn(async move {
            let result = match op(api).await {
                Ok(message) => DataResult::Saved { route, message },
                Err(error) => DataResult::Failed {
                    what: what.to_string(),
                    error,
                    generation,
                },
            };
            Self::send_result(&tx, result).await;
        });
    }

    fn clear_data(&mut self) {
        let page_size = self.config.default_page_size;
        self.patients = PatientsView::new(page_size);
        self.appointments = AppointmentsView::new(page_size);
        self.patient_form = None;
        self.appointment_form = None;
        self.pending_delete = None;
        self.search_query.clear();
    }

    // =========================================================================
    // Lists, Search and Paging
    // =========================================================================

    /// Rows of the current patients page that match the search box
    pub fn visible_patients(&self) -> Vec<&Patient> {
        self.patients
            .page
            .content
            .iter()
            .filter(|p| p.matches_search(&self.search_query))
            .collect()
    }

    /// Rows of the current appointments page passing search and calendar filter
    pub fn visible_appointments(&self) -> Vec<&Appointment> {
        let day = self.appointments.filter_day;
        self.appointments
            .page
            .content
            .iter()
            .filter(|a| day.map_or(true, |d| a.is_on(d)))
            .filter(|a| a.matches_search(&self.search_query))
            .collect()
    }

    pub fn selected_patient(&self) -> Option<&Patient> {
        self.visible_patients()
            .get(self.patients.selection)
            .copied()
    }

    pub fn selected_appointment(&self) -> Option<&Appointment> {
        self.visible_appointments()
            .get(self.appointments.selection)
            .copied()
    }

    fn visible_len(&self) -> usize {
        match self.route {
            Route::Patients => self.visible_patients().len(),
            Route::Appointments => self.visible_appointments().len(),
            Route::Login => 0,
        }
    }

    fn selection_mut(&mut self) -> Option<&mut usize> {
        match self.route {
            Route::Patients => Some(&mut self.patients.selection),
            Route::Appointments => Some(&mut self.appointments.selection),
            Route::Login => None,
        }
    }

    pub fn select_next(&mut self) {
        let max_index = self.visible_len().saturating_sub(1);
        if let Some(selection) = self.selection_mut() {
            *selection = (*selection + 1).min(max_index);
        }
    }

    pub fn select_prev(&mut self) {
        if let Some(selection) = self.selection_mut() {
            *selection = selection.saturating_sub(1);
        }
    }

    pub fn clamp_selection(&mut self) {
        let max_index = self.visible_len().saturating_sub(1);
        if let Some(selection) = self.selection_mut() {
            *selection = (*selection).min(max_index);
        }
    }

    pub fn next_page(&mut self) {
        match self.route {
            Route::Patients => {
                let next = self.patients.request.next(self.patients.page_count());
                if next != self.patients.request {
                    self.patients.request = next;
                    self.patients.selection = 0;
                    self.fetch_patients();
                }
            }
            Route::Appointments => {
                let next = self
                    .appointments
                    .request
                    .next(self.appointments.page_count());
                if next != self.appointments.request {
                    self.appointments.request = next;
                    self.appointments.selection = 0;
                    self.fetch_appointments();
                }
            }
            Route::Login => {}
        }
    }

    pub fn prev_page(&mut self) {
        match self.route {
            Route::Patients if self.patients.request.page_no > 0 => {
                self.patients.request = self.patients.request.prev();
                self.patients.selection = 0;
                self.fetch_patients();
            }
            Route::Appointments if self.appointments.request.page_no > 0 => {
                self.appointments.request = self.appointments.request.prev();
                self.appointments.selection = 0;
                self.fetch_appointments();
            }
            _ => {}
        }
    }

    pub fn cycle_page_size(&mut self) {
        match self.route {
            Route::Patients => {
                self.patients.request = self.patients.request.cycle_size(&PATIENT_PAGE_SIZES);
                self.patients.selection = 0;
                self.fetch_patients();
            }
            Route::Appointments => {
                self.appointments.request = self
                    .appointments
                    .request
                    .cycle_size(&APPOINTMENT_PAGE_SIZES);
                self.appointments.selection = 0;
                self.fetch_appointments();
            }
            Route::Login => {}
        }
    }

    /// Tick or untick the selected patient for bulk delete
    pub fn toggle_mark(&mut self) {
        if let Some(id) = self.selected_patient().map(|p| p.patient_id) {
            if !self.patients.marked.remove(&id) {
                self.patients.marked.insert(id);
            }
        }
    }

    // =========================================================================
    // Calendar
    // =========================================================================

    pub fn move_calendar(&mut self, days: i64) {
        self.appointments.cursor_day += Duration::days(days);
    }

    pub fn calendar_today(&mut self) {
        self.appointments.cursor_day = Local::now().date_naive();
    }

    /// Filter to the highlighted day; picking the filtered day again clears it.
    pub fn toggle_day_filter(&mut self) {
        let day = self.appointments.cursor_day;
        self.appointments.filter_day = if self.appointments.filter_day == Some(day) {
            None
        } else {
            Some(day)
        };
        self.appointments.selection = 0;
    }

    // =========================================================================
    // Forms
    // =========================================================================

    pub fn open_add_form(&mut self) {
        match self.route {
            Route::Patients => {
                self.patient_form = Some(FormState::new(PatientForm::default(), None));
                self.state = AppState::EditingPatient;
            }
            Route::Appointments => {
                let form = AppointmentForm::on_day(self.appointments.filter_day);
                self.appointment_form = Some(FormState::new(form, None));
                self.state = AppState::EditingAppointment;
            }
            Route::Login => {}
        }
    }

    pub fn open_edit_form(&mut self) {
        match self.route {
            Route::Patients => {
                if let Some(patient) = self.selected_patient() {
                    let state =
                        FormState::new(PatientForm::from_patient(patient), Some(patient.patient_id));
                    self.patient_form = Some(state);
                    self.state = AppState::EditingPatient;
                }
            }
            Route::Appointments => {
                if let Some(appointment) = self.selected_appointment() {
                    let state = FormState::new(
                        AppointmentForm::from_appointment(appointment),
                        Some(appointment.appointment_id),
                    );
                    self.appointment_form = Some(state);
                    self.state = AppState::EditingAppointment;
                }
            }
            Route::Login => {}
        }
    }

    pub fn close_form(&mut self) {
        self.patient_form = None;
        self.appointment_form = None;
        self.state = AppState::Normal;
    }

    pub fn submit_patient_form(&mut self) {
        let Some(state) = self.patient_form.as_mut() else {
            return;
        };
        let patient = match state.form.validate() {
            Ok(patient) => patient,
            Err(errors) => {
                state.errors = errors;
                return;
            }
        };
        let original_id = state.original_id;
        self.close_form();

        self.spawn_mutation(Route::Patients, "Error saving patient", move |api| async move {
            match original_id {
                Some(id) => {
                    api.update_patient(id, &patient).await?;
                    Ok("Patient updated successfully".to_string())
                }
                None => {
                    match api.get_patient(patient.patient_id).await {
                        Ok(_) => {
                            return Err(ApiError::BadRequest(
                                "A patient with this ID already exists. Please use a different ID."
                                    .to_string(),
                            ))
                        }
                        Err(ApiError::NotFound(_)) => {}
                        Err(e) => return Err(e),
                    }
                    api.create_patient(&patient).await?;
                    Ok("Patient created successfully".to_string())
                }
            }
        });
    }

    pub fn submit_appointment_form(&mut self) {
        let Some(state) = self.appointment_form.as_mut() else {
            return;
        };

        if state.is_editing() {
            let appointment = match state.form.to_appointment() {
                Ok(appointment) => appointment,
                Err(errors) => {
                    state.errors = errors;
                    return;
                }
            };
            self.close_form();
            self.spawn_mutation(
                Route::Appointments,
                "Failed to update appointment. Please try again",
                move |api| async move {
                    api.update_appointment(&appointment).await?;
                    Ok("Appointment updated successfully!".to_string())
                },
            );
        } else {
            let (patient_id, body) = match state.form.validate() {
                Ok(parts) => parts,
                Err(errors) => {
                    state.errors = errors;
                    return;
                }
            };
            self.close_form();
            self.spawn_mutation(
                Route::Appointments,
                "Failed to add appointment. Please try again",
                move |api| async move {
                    api.create_appointment(patient_id, &body).await?;
                    Ok("Appointment added successfully!".to_string())
                },
            );
        }
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Ask before deleting: ticked patients, else the selected row.
    pub fn request_delete(&mut self) {
        let target = match self.route {
            Route::Patients if !self.patients.marked.is_empty() => Some(DeleteTarget::Patients(
                self.patients.marked.iter().copied().collect(),
            )),
            Route::Patients => self
                .selected_patient()
                .map(|p| DeleteTarget::Patients(vec![p.patient_id])),
            Route::Appointments => self
                .selected_appointment()
                .map(|a| DeleteTarget::Appointment(a.appointment_id)),
            Route::Login => None,
        };
        if let Some(target) = target {
            self.pending_delete = Some(target);
            self.state = AppState::ConfirmingDelete;
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
        self.state = AppState::Normal;
    }

    pub fn confirm_delete(&mut self) {
        self.state = AppState::Normal;
        match self.pending_delete.take() {
            Some(DeleteTarget::Patients(ids)) => {
                self.patients.marked.clear();
                self.spawn_mutation(Route::Patients, "Error deleting patient", move |api| async move {
                    let results = join_all(ids.iter().map(|id| api.delete_patient(*id))).await;
                    if let Some(error) = results.into_iter().find_map(Result::err) {
                        return Err(error);
                    }
                    Ok(if ids.len() == 1 {
                        "Patient and associated appointments deleted successfully".to_string()
                    } else {
                        format!("{} patients and their appointments deleted", ids.len())
                    })
                });
            }
            Some(DeleteTarget::Appointment(id)) => {
                self.spawn_mutation(
                    Route::Appointments,
                    "Failed to delete appointment. Please try again",
                    move |api| async move {
                        api.delete_appointment(id).await?;
                        Ok("Appointment deleted successfully!".to_string())
                    },
                );
            }
            None => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
