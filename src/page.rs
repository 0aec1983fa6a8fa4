use crate::client::PredictionClient;
use crate::config::{DEFAULT_PREDICTION_DAYS, MAX_PREDICTION_DAYS, MIN_PREDICTION_DAYS};
use crate::error::ClientError;
use crate::model::{ModelKind, PopularStock, PredictionRequest, PredictionResponse};
use crate::render::{ticker_from_query, BannerSlot, PopularGrid, ResultsView};
use std::time::Instant;
use tracing::{error, info, warn};

const SUBMITTING_MESSAGE: &str = "Processing your prediction...";
const MAX_DAYS_DIGITS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageState {
    Idle,
    Submitting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    Ticker,
    Model,
    Days,
}

impl FormField {
    pub fn next(self) -> Self {
        match self {
            Self::Ticker => Self::Model,
            Self::Model => Self::Days,
            Self::Days => Self::Ticker,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PredictionForm {
    pub ticker: String,
    pub model: ModelKind,
    /// Raw text of the days field; validated on submit.
    pub days: String,
    pub focus: FormField,
}

impl Default for PredictionForm {
    fn default() -> Self {
        Self {
            ticker: String::new(),
            model: ModelKind::default(),
            days: DEFAULT_PREDICTION_DAYS.to_string(),
            focus: FormField::Ticker,
        }
    }
}

impl PredictionForm {
    pub fn push_char(&mut self, c: char) {
        match self.focus {
            FormField::Ticker if !c.is_control() && !c.is_whitespace() => {
                self.ticker.extend(c.to_uppercase());
            }
            FormField::Days if c.is_ascii_digit() && self.days.len() < MAX_DAYS_DIGITS => {
                self.days.push(c);
            }
            FormField::Model => match c {
                '+' | '>' | 'l' => self.model = self.model.next(),
                '-' | '<' | 'h' => self.model = self.model.prev(),
                _ => {}
            },
            _ => {}
        }
    }

    pub fn backspace(&mut self) {
        match self.focus {
            FormField::Ticker => {
                self.ticker.pop();
            }
            FormField::Days => {
                self.days.pop();
            }
            FormField::Model => {}
        }
    }

    pub fn step(&mut self, up: bool) {
        match self.focus {
            FormField::Model => {
                self.model = if up { self.model.next() } else { self.model.prev() };
            }
            FormField::Days => {
                let current = self.days.parse::<u32>().unwrap_or(DEFAULT_PREDICTION_DAYS);
                let next = if up {
                    current.saturating_add(1)
                } else {
                    current.saturating_sub(1)
                };
                self.days = next.clamp(MIN_PREDICTION_DAYS, MAX_PREDICTION_DAYS).to_string();
            }
            FormField::Ticker => {}
        }
    }

    /// Pre-fills the ticker from a `?ticker=` link. Returns false when the
    /// link carries no ticker.
    pub fn prefill_from_link(&mut self, link: &str) -> bool {
        match ticker_from_query(link) {
            Some(ticker) => {
                self.ticker = ticker;
                true
            }
            None => false,
        }
    }

    pub fn to_request(&self) -> Result<PredictionRequest, ClientError> {
        let days = self.days.trim().parse::<i64>().map_err(|_| {
            ClientError::Validation(format!(
                "Prediction days must be between {} and {}",
                MIN_PREDICTION_DAYS, MAX_PREDICTION_DAYS
            ))
        })?;
        PredictionRequest::new(&self.ticker, self.model, days)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadingIndicator {
    pub visible: bool,
    pub message: String,
}

impl LoadingIndicator {
    fn show(&mut self, message: &str) {
        self.visible = true;
        self.message = message.to_string();
    }

    fn hide(&mut self) {
        self.visible = false;
    }
}

/// Form, loading overlay, results and banner of the prediction page.
#[derive(Debug)]
pub struct PredictionPage {
    pub form: PredictionForm,
    pub state: PageState,
    pub loading: LoadingIndicator,
    pub results: ResultsView,
    pub banners: BannerSlot,
    pub last_request: Option<PredictionRequest>,
}

impl Default for PredictionPage {
    fn default() -> Self {
        Self {
            form: PredictionForm::default(),
            state: PageState::Idle,
            loading: LoadingIndicator::default(),
            results: ResultsView::default(),
            banners: BannerSlot::default(),
            last_request: None,
        }
    }
}

impl PredictionPage {
    pub fn show_error(&mut self, err: &ClientError, now: Instant) {
        self.banners.show_error(err.user_message(), now);
    }

    /// Moves `Idle -> Submitting` and returns the request to send. Invalid
    /// input or an already pending submission shows a banner instead.
    pub fn begin_submit(&mut self, now: Instant) -> Option<PredictionRequest> {
        if self.state == PageState::Submitting {
            self.show_error(&ClientError::Busy, now);
            return None;
        }
        let request = match self.form.to_request() {
            Ok(request) => request,
            Err(err) => {
                self.show_error(&err, now);
                return None;
            }
        };
        self.state = PageState::Submitting;
        self.loading.show(SUBMITTING_MESSAGE);
        self.results.hide();
        self.last_request = Some(request.clone());
        Some(request)
    }

    /// Moves `Submitting -> Idle`; the loading indicator is hidden whatever the
    /// outcome.
    pub fn finish_submit(&mut self, result: Result<PredictionResponse, ClientError>, now: Instant) {
        self.loading.hide();
        self.state = PageState::Idle;

        match result {
            Ok(response) => {
                self.results.render(&response);
                if let Some(req) = &self.last_request {
                    info!(
                        "Displayed {} predictions for {}",
                        self.results.predictions.len(),
                        req.ticker()
                    );
                }
            }
            Err(err) => {
                if err.is_timeout() {
                    warn!("Prediction abandoned: {}", err);
                } else {
                    error!("Prediction error: {}", err);
                }
                self.show_error(&err, now);
            }
        }
    }

    /// Full submit cycle against `client`, for callers that can await in place.
    pub async fn submit(&mut self, client: &PredictionClient) {
        let Some(request) = self.begin_submit(Instant::now()) else {
            return;
        };
        let result = client
            .predict(request.ticker(), request.model(), request.days().into())
            .await;
        self.finish_submit(result, Instant::now());
    }
}

#[derive(Debug, Default)]
pub struct PopularPage {
    pub grid: PopularGrid,
    pub loading: bool,
}

impl PopularPage {
    /// Returns false when a load is already pending.
    pub fn begin_load(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        self.grid.set_loading();
        true
    }

    pub fn finish_load(&mut self, result: Result<Vec<PopularStock>, ClientError>) {
        self.loading = false;
        match result {
            Ok(stocks) => self.grid.render_list(&stocks),
            Err(err) => {
                error!("Error fetching popular stocks: {}", err);
                self.grid.render_failure(&err);
            }
        }
    }

    pub async fn load(&mut self, client: &PredictionClient) {
        if self.begin_load() {
            let result = client.list_popular().await;
            self.finish_load(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::render::GridContent;

    fn filled_page(ticker: &str, days: &str) -> PredictionPage {
        let mut page = PredictionPage::default();
        page.form.ticker = ticker.to_string();
        page.form.days = days.to_string();
        page
    }

    #[test]
    fn ticker_input_is_uppercased() {
        let mut form = PredictionForm::default();
        for c in "aapl ".chars() {
            form.push_char(c);
        }
        assert_eq!(form.ticker, "AAPL");
        form.focus = form.focus.next().next();
        form.days.clear();
        for c in "123".chars() {
            form.push_char(c);
        }
        assert_eq!(form.days, "12");
    }

    #[test]
    fn days_stepper_stays_in_range() {
        let mut form = PredictionForm {
            focus: FormField::Days,
            days: "30".to_string(),
            ..Default::default()
        };
        form.step(true);
        assert_eq!(form.days, "30");
        form.days = "1".to_string();
        form.step(false);
        assert_eq!(form.days, "1");
    }

    #[test]
    fn invalid_form_stays_idle_and_shows_banner() {
        let now = Instant::now();
        let mut page = filled_page("  ", "5");
        assert!(page.begin_submit(now).is_none());
        assert_eq!(page.state, PageState::Idle);
        assert!(!page.loading.visible);
        assert_eq!(
            page.banners.visible(now).unwrap().message,
            "Please enter a stock ticker symbol"
        );

        let mut page = filled_page("AAPL", "");
        assert!(page.begin_submit(now).is_none());
        assert!(page.banners.visible(now).is_some());
    }

    #[test]
    fn second_submit_while_pending_is_rejected() {
        let now = Instant::now();
        let mut page = filled_page("AAPL", "10");
        let request = page.begin_submit(now).unwrap();
        assert_eq!(request.days(), 10);
        assert_eq!(page.state, PageState::Submitting);
        assert!(page.loading.visible);

        assert!(page.begin_submit(now).is_none());
        assert_eq!(page.state, PageState::Submitting);
        assert!(page.banners.visible(now).is_some());
    }

    #[test]
    fn success_renders_and_returns_to_idle() {
        let now = Instant::now();
        let mut page = filled_page("AAPL", "3");
        page.begin_submit(now).unwrap();
        page.finish_submit(
            Ok(PredictionResponse {
                current_price: Some(10.0),
                predictions: vec![Some(11.0), Some(12.0), Some(13.0)],
                ..Default::default()
            }),
            now,
        );
        assert_eq!(page.state, PageState::Idle);
        assert!(!page.loading.visible);
        assert!(page.results.visible);
        assert_eq!(page.results.price, "$10.00");
        assert!(page.banners.visible(now).is_none());
    }

    #[test]
    fn unverified_chart_still_shows_results() {
        let now = Instant::now();
        let mut page = filled_page("AAPL", "2");
        page.begin_submit(now).unwrap();
        page.finish_submit(
            Ok(PredictionResponse {
                current_price: Some(187.5),
                predictions: vec![Some(188.0), Some(189.0)],
                plot1: Some("%%%".to_string()),
                plot2: Some("iVBORw0K\nGgo".to_string()),
                ..Default::default()
            }),
            now,
        );
        assert_eq!(page.state, PageState::Idle);
        assert!(!page.loading.visible);
        assert!(page.results.visible);
        assert_eq!(page.results.price, "$187.50");
        assert!(!page.results.charts[0].verified);
        assert!(page.results.charts[1].verified);
        assert!(page.banners.visible(now).is_none());
    }

    #[tokio::test]
    async fn transport_failure_hides_loading() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            PredictionClient::new(ClientConfig::new(&format!("http://{}", addr)).unwrap()).unwrap();
        let mut page = filled_page("AAPL", "3");
        page.submit(&client).await;

        assert_eq!(page.state, PageState::Idle);
        assert!(!page.loading.visible);
        assert!(page.banners.visible(Instant::now()).is_some());
        assert!(!client.predict_in_flight());
    }

    #[test]
    fn popular_page_load_cycle() {
        let mut page = PopularPage::default();
        assert!(page.begin_load());
        assert!(!page.begin_load());
        page.finish_load(Err(ClientError::InvalidFormat("empty stock list".to_string())));
        assert!(!page.loading);
        assert!(matches!(page.grid.content, GridContent::Message { .. }));

        assert!(page.begin_load());
        page.finish_load(Ok(vec![PopularStock {
            ticker: "AMZN".to_string(),
            name: "Amazon.com, Inc.".to_string(),
        }]));
        assert_eq!(page.grid.cards().len(), 1);
    }

    #[test]
    fn prefill_from_handoff_link() {
        let mut form = PredictionForm::default();
        assert!(form.prefill_from_link("index.html?ticker=googl"));
        assert_eq!(form.ticker, "GOOGL");
        assert!(!form.prefill_from_link("index.html"));
        assert_eq!(form.ticker, "GOOGL");
    }
}
