use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// One discovered dependency
#[derive(Tabled)]
pub struct DependencyRow {
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Scope")]
    pub scope: String,
    #[tabled(rename = "Rule")]
    pub rule: String,
}

/// One field of an unpacked metadata word
#[derive(Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Bits")]
    pub bits: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// One entry of a color map
#[derive(Tabled)]
pub struct ColorRow {
    #[tabled(rename = "Index")]
    pub index: u32,
    #[tabled(rename = "Color")]
    pub color: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }

    /// Render any row type with the same style
    pub fn render<T: Tabled>(rows: &[T]) -> String {
        if rows.is_empty() {
            return String::new();
        }
        Table::new(rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}
