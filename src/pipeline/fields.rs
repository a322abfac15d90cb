use std::collections::HashMap;

use crate::db::FieldSchema;

/// Anki packs a note's fields into one string separated by the unit separator.
pub const FIELD_SEPARATOR: char = '\x1f';

/// Field meanings assumed when a note's model has no schema.
pub const POSITIONAL_NAMES: [&str; 4] = ["Expression", "Meaning", "Reading", "Lesson Number"];

/// Split a packed field string and trim each value.
pub fn split_fields(packed: &str, delimiter: char) -> Vec<String> {
    packed
        .split(delimiter)
        .map(|f| f.trim().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    /// Position in the packed string.
    pub index: usize,
    pub name: String,
    pub value: String,
}

/// Decoded fields in their original order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<FieldEntry>,
}

impl FieldMap {
    pub fn iter(&self) -> impl Iterator<Item = &FieldEntry> {
        self.entries.iter()
    }

    /// True when every field value is empty.
    pub fn is_blank(&self) -> bool {
        self.entries.iter().all(|e| e.value.is_empty())
    }
}

/// Position to name lookup for one note type.
#[derive(Debug, Clone)]
struct FieldNames {
    names: Vec<Option<String>>,
}

impl FieldNames {
    fn positional() -> Self {
        FieldNames {
            names: POSITIONAL_NAMES.iter().map(|n| Some(n.to_string())).collect(),
        }
    }

    /// `Ok(name)` for a usable name, `Err(())` for a malformed schema entry.
    /// Positions past the end of the schema get `Field{n}`.
    fn name_at(&self, index: usize) -> Result<String, ()> {
        match self.names.get(index) {
            Some(Some(name)) => Ok(name.clone()),
            Some(None) => Err(()),
            None => Ok(format!("Field{}", index + 1)),
        }
    }
}

pub struct Decoded {
    pub fields: FieldMap,
    /// Fields dropped because their schema entry had no name.
    pub malformed: usize,
    /// No schema was known for the model; positional names were used.
    pub positional: bool,
}

/// Decodes packed fields against schemas resolved once per model id.
pub struct Decoder {
    by_model: HashMap<i64, FieldNames>,
    positional: FieldNames,
    delimiter: char,
}

impl Decoder {
    pub fn new(schemas: &HashMap<i64, FieldSchema>) -> Self {
        let by_model = schemas
            .iter()
            .filter(|(_, s)| !s.names.is_empty())
            .map(|(mid, s)| {
                (
                    *mid,
                    FieldNames {
                        names: s.names.clone(),
                    },
                )
            })
            .collect();
        Decoder {
            by_model,
            positional: FieldNames::positional(),
            delimiter: FIELD_SEPARATOR,
        }
    }

    pub fn decode(&self, model_id: i64, packed: &str) -> Decoded {
        let (names, positional) = match self.by_model.get(&model_id) {
            Some(names) => (names, false),
            None => (&self.positional, true),
        };

        let mut entries = Vec::new();
        let mut malformed = 0;
        for (index, value) in split_fields(packed, self.delimiter).into_iter().enumerate() {
            match names.name_at(index) {
                Ok(name) => entries.push(FieldEntry { index, name, value }),
                Err(()) => malformed += 1,
            }
        }

        Decoded {
            fields: FieldMap { entries },
            malformed,
            positional,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl FieldMap {
        fn get(&self, name: &str) -> Option<&str> {
            self.entries
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.value.as_str())
        }

        fn at(&self, index: usize) -> Option<&FieldEntry> {
            self.entries.iter().find(|e| e.index == index)
        }
    }

    fn schema(names: &[Option<&str>]) -> FieldSchema {
        FieldSchema {
            names: names.iter().map(|n| n.map(str::to_string)).collect(),
        }
    }

    #[test]
    fn split_trims_each_field() {
        assert_eq!(
            split_fields("食べる\x1f to eat\x1f たべる\x1f 5", FIELD_SEPARATOR),
            vec!["食べる", "to eat", "たべる", "5"]
        );
        assert_eq!(split_fields("", FIELD_SEPARATOR), vec![""]);
    }

    #[test]
    fn split_then_join_reproduces_trimmed_fields() {
        let samples = [
            "a\x1fb\x1fc",
            "  padded \x1f\x1f tail ",
            "単語\x1fword\x1fたんご\x1f12\x1fextra",
            "no separator",
        ];
        for packed in samples {
            let fields = split_fields(packed, FIELD_SEPARATOR);
            let joined = fields.join(&FIELD_SEPARATOR.to_string());
            let expected: Vec<&str> = packed.split(FIELD_SEPARATOR).map(str::trim).collect();
            assert_eq!(joined, expected.join("\x1f"));
            assert_eq!(split_fields(&joined, FIELD_SEPARATOR), fields);
        }
    }

    #[test]
    fn unknown_model_falls_back_to_positions() {
        let decoder = Decoder::new(&HashMap::new());
        let d = decoder.decode(99, "行く\x1fto go");
        assert!(d.positional);
        assert_eq!(d.malformed, 0);
        assert_eq!(d.fields.get("Expression"), Some("行く"));
        assert_eq!(d.fields.get("Meaning"), Some("to go"));
        assert_eq!(d.fields.get("Reading"), None);
    }

    #[test]
    fn named_schema_and_overflow_fields() {
        let mut schemas = HashMap::new();
        schemas.insert(1, schema(&[Some("Front"), Some("Back")]));
        let decoder = Decoder::new(&schemas);
        let d = decoder.decode(1, "犬\x1fdog\x1fextra");
        assert!(!d.positional);
        assert_eq!(d.fields.get("Front"), Some("犬"));
        assert_eq!(d.fields.get("Back"), Some("dog"));
        assert_eq!(d.fields.get("Field3"), Some("extra"));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let mut schemas = HashMap::new();
        schemas.insert(1, schema(&[Some("Front"), None, Some("Lesson")]));
        let decoder = Decoder::new(&schemas);
        let d = decoder.decode(1, "猫\x1fcat\x1f3");
        assert_eq!(d.malformed, 1);
        assert_eq!(d.fields.iter().count(), 2);
        assert_eq!(d.fields.at(2).map(|e| e.name.as_str()), Some("Lesson"));
        assert!(d.fields.at(1).is_none());
    }

    #[test]
    fn empty_schema_treated_as_unresolved() {
        let mut schemas = HashMap::new();
        schemas.insert(1, FieldSchema::default());
        let d = Decoder::new(&schemas).decode(1, "a\x1fb");
        assert!(d.positional);
    }

    #[test]
    fn blank_detection() {
        let decoder = Decoder::new(&HashMap::new());
        assert!(decoder.decode(1, " \x1f ").fields.is_blank());
        assert!(!decoder.decode(1, " \x1fx").fields.is_blank());
    }
}
