//! `{placeholder}` substitution for configuration templates.
//!
//! Protection lines, group names and stream paths in the provisioning
//! configuration reference `{show}`, `{user}` and `{mdy_str}`. Unknown
//! placeholders are left untouched so a typo shows up verbatim in the
//! provisioned object instead of silently disappearing.

pub struct Template<'a> {
    text: &'a str,
    vars: Vec<(&'static str, String)>,
}

impl<'a> Template<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            vars: Vec::new(),
        }
    }

    pub fn var(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.vars.push((key, value.into()));
        self
    }

    pub fn render(self) -> String {
        let mut result = self.text.to_string();
        for (key, value) in self.vars {
            result = result.replace(&format!("{{{key}}}"), &value);
        }
        result
    }
}
