use chrono::{Datelike, Local, NaiveDate};
use showsetup_core::{ShowIdentifier, Template};

/// Values substituted into configuration templates for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningContext {
    show: ShowIdentifier,
    user: String,
    date: NaiveDate,
}

impl ProvisioningContext {
    pub fn new(show: ShowIdentifier, user: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            show,
            user: user.into(),
            date,
        }
    }

    /// Context dated today in local time.
    pub fn today(show: ShowIdentifier, user: impl Into<String>) -> Self {
        Self::new(show, user, Local::now().date_naive())
    }

    pub fn show(&self) -> &str {
        self.show.as_str()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// `month/day/year` without zero padding, e.g. `7/4/2024`.
    pub fn mdy_str(&self) -> String {
        format!("{}/{}/{}", self.date.month(), self.date.day(), self.date.year())
    }

    /// Substitute `{show}`, `{user}` and `{mdy_str}` in `template`.
    pub fn resolve(&self, template: &str) -> String {
        Template::new(template)
            .var("show", self.show.as_str())
            .var("user", self.user.as_str())
            .var("mdy_str", self.mdy_str())
            .render()
    }

    /// Description stamped on groups and streams this run creates.
    pub fn created_by(&self) -> String {
        format!("Created by {} {}", self.user, self.mdy_str())
    }
}
