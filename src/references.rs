//! File references held in project tables
//!
//! Which columns carry file or folder paths is decided by the column name
//! declared in `<col>`, sometimes only within a particular table. The
//! decision is a small rule table so new roles can come from configuration.

use crate::table::{Table, TableEntry};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::BufRead;

/// A column name that holds file references, optionally limited to one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl ColumnRule {
    pub fn any_table(role: &str) -> Self {
        Self {
            role: role.to_string(),
            table: None,
        }
    }

    pub fn in_table(role: &str, table: &str) -> Self {
        Self {
            role: role.to_string(),
            table: Some(table.to_string()),
        }
    }

    pub fn matches(&self, table: &str, role: &str) -> bool {
        self.role == role && self.table.as_deref().map_or(true, |t| t == table)
    }
}

/// Rule table deciding which columns are reference-bearing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRules {
    rules: Vec<ColumnRule>,
}

impl Default for ColumnRules {
    fn default() -> Self {
        Self {
            rules: vec![
                ColumnRule::any_table("ISBuildSourcePath"),
                ColumnRule::any_table("ISScriptFile"),
                ColumnRule::any_table("MsiPath"),
                ColumnRule::in_table("SourceFolder", "ISDynamicFile"),
            ],
        }
    }
}

impl ColumnRules {
    /// No rules at all
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add(&mut self, rule: ColumnRule) {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
    }

    pub fn extend<I: IntoIterator<Item = ColumnRule>>(&mut self, rules: I) {
        for rule in rules {
            self.add(rule);
        }
    }

    pub fn is_reference_column(&self, table: &str, role: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(table, role))
    }

    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }
}

/// Gather the raw references stored in one table
///
/// Column indices count `<col>` declarations in order; a row's cell at a
/// reference-bearing index is recorded when it is not empty.
pub fn collect_references<R: BufRead>(
    table: &mut Table<'_, R>,
    rules: &ColumnRules,
) -> Result<Vec<String>> {
    let table_name = table.name().to_string();
    let mut references = Vec::new();
    let mut targets = BTreeSet::new();
    let mut column = 0usize;

    while let Some(entry) = table.next_entry()? {
        match entry {
            TableEntry::Column(role) => {
                if rules.is_reference_column(&table_name, &role) {
                    log::debug!("{}: column {} ({}) holds file references", table_name, column, role);
                    targets.insert(column);
                }
                column += 1;
            }
            TableEntry::Row(_) if targets.is_empty() => {}
            TableEntry::Row(cells) => {
                references.extend(
                    cells
                        .into_iter()
                        .enumerate()
                        .filter(|(i, cell)| targets.contains(i) && !cell.is_empty())
                        .map(|(_, cell)| cell),
                );
            }
        }
    }

    Ok(references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableReader;

    fn references_by_table(xml: &str, rules: &ColumnRules) -> Vec<(String, Vec<String>)> {
        let mut reader = TableReader::from_reader(xml.as_bytes());
        let mut result = Vec::new();
        while let Some(mut table) = reader.next_table().unwrap() {
            let name = table.name().to_string();
            result.push((name, collect_references(&mut table, rules).unwrap()));
        }
        result
    }

    #[test]
    fn test_collects_build_source_path() {
        let xml = r#"<msi><table name="File">
            <col key="yes">File</col><col>Component_</col><col>ISBuildSourcePath</col>
            <row><td>a</td><td>c1</td><td>&lt;ISProjectFolder&gt;\bin\a.dll</td></row>
            <row><td>b</td><td>c1</td><td/></row>
            <row><td>c</td><td>c2</td><td>C:\abs\c.dll</td></row>
        </table></msi>"#;

        let tables = references_by_table(xml, &ColumnRules::default());
        assert_eq!(
            tables[0].1,
            vec!["<ISProjectFolder>\\bin\\a.dll", "C:\\abs\\c.dll"]
        );
    }

    #[test]
    fn test_source_folder_only_in_dynamic_file_table() {
        let xml = r#"<msi>
            <table name="ISDynamicFile">
                <col>Component_</col><col>SourceFolder</col>
                <row><td>c</td><td>&lt;Data&gt;\dyn</td></row>
            </table>
            <table name="Other">
                <col>Component_</col><col>SourceFolder</col>
                <row><td>c</td><td>&lt;Data&gt;\other</td></row>
            </table>
        </msi>"#;

        let tables = references_by_table(xml, &ColumnRules::default());
        assert_eq!(tables[0].1, vec!["<Data>\\dyn"]);
        assert!(tables[1].1.is_empty());
    }

    #[test]
    fn test_multiple_reference_columns() {
        let xml = r#"<msi><table name="Binary">
            <col>Name</col><col>ISScriptFile</col><col>MsiPath</col>
            <row><td>n</td><td>s.rul</td><td>m.msi</td></row>
        </table></msi>"#;

        let tables = references_by_table(xml, &ColumnRules::default());
        assert_eq!(tables[0].1, vec!["s.rul", "m.msi"]);
    }

    #[test]
    fn test_no_reference_columns() {
        let xml = r#"<msi><table name="Property">
            <col>Property</col><col>Value</col>
            <row><td>ISBuildSourcePath</td><td>x</td></row>
        </table></msi>"#;

        let tables = references_by_table(xml, &ColumnRules::default());
        assert!(tables[0].1.is_empty());
    }

    #[test]
    fn test_extra_rule_from_configuration() {
        let xml = r#"<msi><table name="ISSetupFile">
            <col>ISSetupFile</col><col>Stream</col>
            <row><td>f</td><td>setup.ini</td></row>
        </table></msi>"#;

        let mut rules = ColumnRules::default();
        rules.extend([ColumnRule::in_table("Stream", "ISSetupFile")]);

        let tables = references_by_table(xml, &rules);
        assert_eq!(tables[0].1, vec!["setup.ini"]);
        assert!(references_by_table(xml, &ColumnRules::default())[0].1.is_empty());
    }

    #[test]
    fn test_rule_matching() {
        let rule = ColumnRule::in_table("SourceFolder", "ISDynamicFile");
        assert!(rule.matches("ISDynamicFile", "SourceFolder"));
        assert!(!rule.matches("File", "SourceFolder"));
        assert!(!rule.matches("ISDynamicFile", "sourcefolder"));
        assert!(ColumnRule::any_table("MsiPath").matches("Anything", "MsiPath"));
    }

    #[test]
    fn test_duplicate_rules_ignored() {
        let mut rules = ColumnRules::default();
        let before = rules.rules().len();
        rules.add(ColumnRule::any_table("MsiPath"));
        assert_eq!(rules.rules().len(), before);
        assert!(ColumnRules::empty().rules().is_empty());
    }
}
