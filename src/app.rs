use crate::client::PredictionClient;
use crate::error::ClientError;
use crate::model::{PopularStock, PredictionResponse};
use crate::page::{FormField, PopularPage, PredictionPage};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tab {
    Predict,
    Popular,
}

/// Results of background requests, delivered back to the event loop.
pub enum AppEvent {
    Prediction(Result<PredictionResponse, ClientError>),
    Popular(Result<Vec<PopularStock>, ClientError>),
}

pub struct App {
    pub should_quit: bool,
    pub tab: Tab,
    pub predict: PredictionPage,
    pub popular: PopularPage,
    pub results_scroll: u16,
    client: PredictionClient,
    tx: mpsc::UnboundedSender<AppEvent>,
    rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl App {
    pub fn new(client: PredictionClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            should_quit: false,
            tab: Tab::Predict,
            predict: PredictionPage::default(),
            popular: PopularPage::default(),
            results_scroll: 0,
            client,
            tx,
            rx,
        }
    }

    pub fn api_host(&self) -> String {
        self.client
            .config()
            .api_base_url
            .host_str()
            .unwrap_or("?")
            .to_string()
    }

    /// True while a prediction request is on the wire.
    pub fn request_pending(&self) -> bool {
        self.client.predict_in_flight()
    }

    pub async fn run(&mut self, terminal: &mut crate::tui::Tui) -> io::Result<()> {
        self.request_popular();
        while !self.should_quit {
            terminal.draw(|f| crate::ui::render(f, self))?;

            while let Ok(ev) = self.rx.try_recv() {
                self.handle_event(ev);
            }
            self.predict.banners.prune(Instant::now());

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn handle_event(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::Prediction(result) => {
                self.predict.finish_submit(result, Instant::now());
                if self.predict.results.take_scroll_request() {
                    self.tab = Tab::Predict;
                    self.results_scroll = 0;
                }
            }
            AppEvent::Popular(result) => self.popular.finish_load(result),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match key.code {
            KeyCode::F(1) => self.tab = Tab::Predict,
            KeyCode::F(2) => self.tab = Tab::Popular,
            KeyCode::Esc => self.should_quit = true,
            _ => match self.tab {
                Tab::Predict => self.handle_predict_key(key.code),
                Tab::Popular => self.handle_popular_key(key.code),
            },
        }
    }

    fn handle_predict_key(&mut self, code: KeyCode) {
        let on_ticker = self.predict.form.focus == FormField::Ticker;
        match code {
            KeyCode::Enter => self.submit_prediction(),
            KeyCode::Tab => self.predict.form.focus = self.predict.form.focus.next(),
            KeyCode::Backspace => self.predict.form.backspace(),
            KeyCode::Up if !on_ticker => self.predict.form.step(true),
            KeyCode::Down if !on_ticker => self.predict.form.step(false),
            KeyCode::Up | KeyCode::PageUp => {
                self.results_scroll = self.results_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::PageDown => {
                self.results_scroll = self.results_scroll.saturating_add(1);
            }
            KeyCode::Char(c) => self.predict.form.push_char(c),
            _ => {}
        }
    }

    fn handle_popular_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => self.request_popular(),
            KeyCode::Up | KeyCode::Char('k') => self.popular.grid.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.popular.grid.select_next(),
            KeyCode::Enter => self.open_selected_stock(),
            _ => {}
        }
    }

    /// Follows the selected card's link to the prediction page.
    pub fn open_selected_stock(&mut self) {
        let Some(target) = self.popular.grid.selected_card().map(|c| c.target.clone()) else {
            return;
        };
        if self.predict.form.prefill_from_link(&target) {
            debug!("Handing off {} to the prediction page", target);
            self.predict.form.focus = FormField::Ticker;
            self.tab = Tab::Predict;
        }
    }

    fn submit_prediction(&mut self) {
        let Some(request) = self.predict.begin_submit(Instant::now()) else {
            return;
        };
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .predict(request.ticker(), request.model(), request.days().into())
                .await;
            let _ = tx.send(AppEvent::Prediction(result));
        });
    }

    fn request_popular(&mut self) {
        if !self.popular.begin_load() {
            return;
        }
        info!("Loading popular stocks");
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.list_popular().await;
            let _ = tx.send(AppEvent::Popular(result));
        });
    }
}
