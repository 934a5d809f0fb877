//! Status lines for the display and the web page.

use std::sync::Arc;

use crate::board::MessageBoard;
use crate::board::message::{DisplayStatus, HtmlStatus, Message, Mode, Rgb, Topic};
use crate::component::Component;

const C_ERROR: Rgb = (255, 0, 0);
const C_OK: Rgb = (0, 127, 0);
const C_ALERT: Rgb = (0, 159, 255);
const C_MEASURE: Rgb = (0, 159, 255);

const HTML_ERROR: &str = "color:red";
const HTML_OK: &str = "color:#007f00";
const HTML_ALERT: &str = "color:#009fff";

#[derive(Debug, Default)]
pub struct Status {
    /// A measurement arrived that the display has not shown yet.
    new_measurement: bool,
    measurement_error: bool,
    last_html: Option<HtmlStatus>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_measurement(&mut self, board: &MessageBoard, error: bool) {
        self.new_measurement = true;
        self.measurement_error = error;
        board.post(Message::Status(self.display_status(board)));
        self.publish_html(board);
    }

    fn on_status_processed(&mut self, board: &MessageBoard) {
        if self.new_measurement {
            self.new_measurement = false;
            board.post(Message::Status(self.display_status(board)));
        }
    }

    fn display_status(&self, board: &MessageBoard) -> DisplayStatus {
        let (text, colour) = if self.new_measurement {
            ("Measuring.", C_MEASURE)
        } else if self.measurement_error {
            ("Sensor error.", C_ERROR)
        } else if board.query(Topic::TimeSync).is_none() {
            ("Waiting for radio signal.", C_ALERT)
        } else if board.query(Topic::Mode) == Some(Message::Mode(Mode::Manual)) {
            ("Status: OK (manual).", C_OK)
        } else {
            ("Status: OK (automatic).", C_OK)
        };
        DisplayStatus {
            text: text.to_string(),
            colour,
        }
    }

    fn html_status(&self, board: &MessageBoard) -> HtmlStatus {
        let last_sync = match board.query(Topic::TimeSync) {
            Some(Message::TimeSync(when)) => Some(when),
            _ => None,
        };
        if self.measurement_error {
            return HtmlStatus {
                text: "Sensor error.".into(),
                style: HTML_ERROR,
                last_sync,
            };
        }
        if last_sync.is_none() {
            return HtmlStatus {
                text: "Waiting for radio signal.".into(),
                style: HTML_ALERT,
                last_sync,
            };
        }
        let comment = match board.query(Topic::FanComment) {
            Some(Message::FanComment(text)) => text,
            _ => "N/A".to_string(),
        };
        let failed = comment.to_lowercase().contains("error");
        let (word, style) = if failed { ("Error", HTML_ERROR) } else { ("OK", HTML_OK) };
        HtmlStatus {
            text: format!("Status: {word}. {comment}"),
            style,
            last_sync,
        }
    }

    fn publish_html(&mut self, board: &MessageBoard) {
        let status = self.html_status(board);
        if self.last_html.as_ref() != Some(&status) {
            self.last_html = Some(status.clone());
            board.post(Message::HtmlStatus(status));
        }
    }

    /// Subscribes to `Measurement`, `StatusProcessed` and `Mode`.
    pub fn component(self, board: Arc<MessageBoard>) -> Component<Self> {
        Component::new("status", board, self)
            .on(Topic::Measurement, |status, board, message| {
                if let Message::Measurement(m) = message {
                    status.on_measurement(board, m.indoor.error || m.outdoor.error);
                }
                Ok(None)
            })
            .on(Topic::StatusProcessed, |status, board, _| {
                status.on_status_processed(board);
                Ok(None)
            })
            .on(Topic::Mode, |status, board, _| {
                board.post(Message::Status(status.display_status(board)));
                Ok(None)
            })
    }
}
