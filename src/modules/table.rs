use std::fmt;
use serde_json::Value;
use crate::modules::schema::ResourceSchema;
use crate::modules::types::Record;

const MAX_CELL: usize = 40;

/// Rows of one resource as the dashboard table shows them.
pub struct Table<'a> {
    schema: &'a ResourceSchema,
    rows: &'a [Record],
    fetching: bool,
}

impl<'a> Table<'a> {
    pub fn new(schema: &'a ResourceSchema, rows: &'a [Record], fetching: bool) -> Self {
        Self { schema, rows, fetching }
    }

    fn header(&self) -> Vec<String> {
        let mut header = vec!["Sr. No.".to_string()];
        header.extend(self.schema.fields.iter().map(|f| f.label().to_string()));
        header.extend(self.schema.nested.iter().map(|n| n.label().to_string()));
        header.push("ID".to_string());
        header
    }

    fn cells(&self, position: usize, record: &Record) -> Vec<String> {
        let mut cells = vec![(position + 1).to_string()];
        cells.extend(self.schema.fields.iter().map(|f| cell(record.get(&f.name), f.display.as_deref())));
        cells.extend(self.schema.nested.iter().map(|n| match record.get(&n.name) {
            Some(Value::Array(items)) => format!("{} entries", items.len()),
            _ => "-".to_string(),
        }));
        cells.push(record.id.clone());
        cells
    }
}

/// `display` names the key to show when the value is a populated record.
fn cell(value: Option<&Value>, display: Option<&str>) -> String {
    let text = match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::Object(object)) => display
            .into_iter()
            .chain(["_id"])
            .find_map(|key| object.get(key).and_then(Value::as_str))
            .unwrap_or("-")
            .to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    };
    clip(&text)
}

fn clip(text: &str) -> String {
    let text = text.replace('\n', " ");
    if text.chars().count() <= MAX_CELL {
        return text;
    }
    let mut clipped: String = text.chars().take(MAX_CELL - 3).collect();
    clipped.push_str("...");
    clipped
}

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fetching {
            return writeln!(f, "Loading...");
        }
        if self.rows.is_empty() {
            return writeln!(f, "No {} Data Found.", self.schema.label);
        }

        let header = self.header();
        let body: Vec<Vec<String>> = self.rows.iter().enumerate().map(|(i, r)| self.cells(i, r)).collect();
        let widths: Vec<usize> = (0..header.len())
            .map(|col| {
                body.iter()
                    .map(|row| row[col].chars().count())
                    .chain(std::iter::once(header[col].chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for row in std::iter::once(&header).chain(body.iter()) {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(text, width)| format!("{text:<width$}"))
                .collect();
            writeln!(f, "{}", line.join(" | ").trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::schema::Registry;
    use serde_json::json;

    #[test]
    fn placeholders() {
        let registry = Registry::builtin().unwrap();
        let faq = registry.resource("faq").unwrap();
        assert_eq!(Table::new(faq, &[], true).to_string(), "Loading...\n");
        assert_eq!(Table::new(faq, &[], false).to_string(), "No FAQ Data Found.\n");
    }

    #[test]
    fn rows_are_numbered() {
        let registry = Registry::builtin().unwrap();
        let faq = registry.resource("faq").unwrap();
        let rows = vec![Record::new(
            "f1",
            json!({"que": "What is this?", "ans": "An agro product site."})
                .as_object()
                .cloned()
                .unwrap(),
        )];
        let out = Table::new(faq, &rows, false).to_string();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("Sr. No. | Question"));
        assert!(lines[1].starts_with("1       | What is this?"));
        assert!(lines[1].ends_with("| f1"));
    }

    #[test]
    fn populated_references_show_their_name() {
        let registry = Registry::builtin().unwrap();
        let categories = registry.resource("categories").unwrap();
        let rows = vec![Record::new(
            "c1",
            json!({"productId": {"_id": "p1", "productName": "Mango pickle"}, "category": []})
                .as_object()
                .cloned()
                .unwrap(),
        )];
        let out = Table::new(categories, &rows, false).to_string();
        let body = out.lines().nth(1).unwrap();
        assert!(body.contains("Mango pickle"));
        assert!(!body.contains("_id"));
        assert_eq!(cell(Some(&json!({"_id": "p2"})), Some("productName")), "p2");
    }

    #[test]
    fn long_cells_are_clipped() {
        let long = "word ".repeat(20);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), MAX_CELL);
        assert!(clipped.ends_with("..."));
    }
}
