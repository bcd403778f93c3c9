use bridge_registry::{ErrorPatternRule, TableSeparator};
use serde_json::{Map, Value};

use crate::event::{Channel, ParsedEvent, ParsedResult};
use crate::parser::{match_error_pattern, OutputParser};

/// Parses whitespace/tab/comma-delimited tabular stdout: the first non-blank
/// line is the header row, every subsequent line a record keyed by it.
pub struct TableParser {
    separator: TableSeparator,
    error_patterns: Vec<ErrorPatternRule>,
    header: Option<Vec<String>>,
    rows: Vec<Value>,
    stderr_lines: Vec<String>,
}

impl TableParser {
    pub fn new(separator: TableSeparator, error_patterns: Vec<ErrorPatternRule>) -> Self {
        Self {
            separator,
            error_patterns,
            header: None,
            rows: Vec::new(),
            stderr_lines: Vec::new(),
        }
    }

    fn split(&self, line: &str) -> Vec<String> {
        match self.separator {
            TableSeparator::Whitespace => {
                line.split_whitespace().map(|s| s.to_string()).collect()
            }
            TableSeparator::Tab => line.split('\t').map(|s| s.to_string()).collect(),
            TableSeparator::Comma => line.split(',').map(|s| s.trim().to_string()).collect(),
        }
    }
}

impl OutputParser for TableParser {
    fn reset(&mut self) {
        self.header = None;
        self.rows.clear();
        self.stderr_lines.clear();
    }

    fn parse_line(&mut self, channel: Channel, line: &str) -> Vec<ParsedEvent> {
        if channel == Channel::Stderr {
            self.stderr_lines.push(line.to_string());
            return Vec::new();
        }
        if line.trim().is_empty() {
            return vec![ParsedEvent::Output {
                raw_line: line.to_string(),
                parsed_structure: None,
            }];
        }

        let cells = self.split(line);
        if self.header.is_none() {
            self.header = Some(cells);
            return vec![ParsedEvent::Output {
                raw_line: line.to_string(),
                parsed_structure: None,
            }];
        }

        let header = self.header.as_ref().unwrap();
        let mut row = Map::new();
        for (index, cell) in cells.iter().enumerate() {
            let key = header
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("column_{index}"));
            row.insert(key, Value::String(cell.clone()));
        }
        let row = Value::Object(row);
        self.rows.push(row.clone());

        vec![ParsedEvent::Output {
            raw_line: line.to_string(),
            parsed_structure: Some(row),
        }]
    }

    fn finalize(&mut self) -> ParsedResult {
        let error = match_error_pattern(&self.error_patterns, &self.stderr_lines.join("\n"));
        ParsedResult {
            success: error.is_none(),
            data: Some(Value::Array(self.rows.clone())),
            error,
            warnings: Vec::new(),
            metadata: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_seeds_subsequent_row_keys() {
        let mut parser = TableParser::new(TableSeparator::Whitespace, vec![]);
        parser.parse_line(Channel::Stdout, "ID STATUS");
        parser.parse_line(Channel::Stdout, "srv-1 running");
        let result = parser.finalize();
        assert_eq!(
            result.data,
            Some(serde_json::json!([{"ID": "srv-1", "STATUS": "running"}]))
        );
    }
}
