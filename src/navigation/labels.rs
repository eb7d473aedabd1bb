use crate::types::{Record, Value};
use std::collections::HashMap;

/// Which value labels a row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DisplayField {
    /// First non-null field, else the record id
    #[default]
    Auto,
    Id,
    Field(String),
}

impl DisplayField {
    fn render(&self, record: &Record) -> Option<String> {
        match self {
            DisplayField::Auto => None,
            DisplayField::Id => Some(record.id.to_string()),
            DisplayField::Field(name) => record.get(name).map(value_text),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        v => v.display(60),
    }
}

/// Row label settings of one board column
#[derive(Debug, Clone, Default)]
pub struct LabelFormat {
    pub display: DisplayField,
    child_display: HashMap<String, DisplayField>,
}

impl LabelFormat {
    /// Label using the column-wide setting
    pub fn format(&self, record: &Record) -> String {
        self.display
            .render(record)
            .unwrap_or_else(|| record.default_label())
    }

    /// Label for a row of `layer_id`, honouring a per-layer override
    pub fn format_for_layer(&self, layer_id: &str, record: &Record) -> String {
        match self.child_display.get(layer_id) {
            Some(DisplayField::Auto) | None => self.format(record),
            Some(chosen) => chosen
                .render(record)
                .unwrap_or_else(|| self.format(record)),
        }
    }

    pub fn child_display(&self, layer_id: &str) -> &DisplayField {
        self.child_display
            .get(layer_id)
            .unwrap_or(&DisplayField::Auto)
    }

    /// Override the label of rows from `layer_id`; rejects unknown fields
    pub fn set_child_display(&mut self, layer_id: &str, fields: &[String], display: DisplayField) -> bool {
        if let DisplayField::Field(name) = &display {
            if !fields.contains(name) {
                return false;
            }
        }
        if display == DisplayField::Auto {
            self.child_display.remove(layer_id);
        } else {
            self.child_display.insert(layer_id.to_string(), display);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;

    fn record() -> Record {
        Record::new(
            RecordId(9),
            vec!["code".into(), "name".into()],
            vec![Value::Null, Value::Text("Nine".into())],
        )
    }

    #[test]
    fn auto_uses_first_non_null_value() {
        assert_eq!(LabelFormat::default().format(&record()), "Nine");
    }

    #[test]
    fn column_field_and_id_choices() {
        let mut fmt = LabelFormat {
            display: DisplayField::Id,
            ..Default::default()
        };
        assert_eq!(fmt.format(&record()), "9");

        fmt.display = DisplayField::Field("code".into());
        assert_eq!(fmt.format(&record()), "");

        // field missing from this layer falls back to auto
        fmt.display = DisplayField::Field("other".into());
        assert_eq!(fmt.format(&record()), "Nine");
    }

    #[test]
    fn per_layer_override_wins() {
        let mut fmt = LabelFormat::default();
        let fields = vec!["code".to_string(), "name".to_string()];
        assert!(!fmt.set_child_display("t", &fields, DisplayField::Field("zz".into())));
        assert!(fmt.set_child_display("t", &fields, DisplayField::Id));
        assert_eq!(fmt.format_for_layer("t", &record()), "9");
        assert_eq!(fmt.format_for_layer("other", &record()), "Nine");

        assert!(fmt.set_child_display("t", &fields, DisplayField::Auto));
        assert_eq!(fmt.child_display("t"), &DisplayField::Auto);
    }
}
