//! Reader and writer for Perforce spec forms (`p4 <spec> -o` / `-i`).
//!
//! A form is a sequence of fields. Short fields sit on one line
//! (`Stream:\t//FOO/FOO-main`); list and text fields put their values on
//! the following tab-indented lines. Comment lines start with `#`.

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    values: Vec<String>,
    inline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecForm {
    fields: Vec<Field>,
}

impl SpecForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut fields: Vec<Field> = Vec::new();

        for line in text.lines() {
            if let Some(continuation) = line.strip_prefix('\t') {
                if let Some(field) = fields.last_mut() {
                    field.values.push(continuation.to_string());
                }
                continue;
            }

            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((name, rest)) = line.split_once(':') else {
                continue;
            };
            let rest = rest.trim();
            fields.push(Field {
                name: name.trim().to_string(),
                values: if rest.is_empty() {
                    Vec::new()
                } else {
                    vec![rest.to_string()]
                },
                inline: !rest.is_empty(),
            });
        }

        Self { fields }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            if field.inline {
                let value = field.values.first().map(String::as_str).unwrap_or("");
                out.push_str(&format!("{}:\t{}\n\n", field.name, value));
            } else {
                out.push_str(&field.name);
                out.push_str(":\n");
                for value in &field.values {
                    out.push('\t');
                    out.push_str(value);
                    out.push('\n');
                }
                out.push('\n');
            }
        }
        out
    }

    fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// First value of a field.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.field(name)
            .and_then(|field| field.values.first())
            .map(String::as_str)
    }

    pub fn lines(&self, name: &str) -> &[String] {
        self.field(name).map(|field| field.values.as_slice()).unwrap_or(&[])
    }

    /// A text field joined back into one string, trailing blank lines dropped.
    pub fn text(&self, name: &str) -> String {
        self.lines(name).join("\n").trim_end().to_string()
    }

    pub fn set_value(&mut self, name: &str, value: &str) {
        self.upsert(name, vec![value.to_string()], true);
    }

    pub fn set_lines<I, S>(&mut self, name: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = lines.into_iter().map(Into::into).collect();
        self.upsert(name, values, false);
    }

    pub fn set_text(&mut self, name: &str, text: &str) {
        self.set_lines(name, text.lines());
    }

    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|field| field.name != name);
    }

    fn upsert(&mut self, name: &str, values: Vec<String>, inline: bool) {
        if let Some(field) = self.fields.iter_mut().find(|field| field.name == name) {
            field.values = values;
            field.inline = inline;
        } else {
            self.fields.push(Field {
                name: name.to_string(),
                values,
                inline,
            });
        }
    }
}
