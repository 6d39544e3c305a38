use serde::{Deserialize, Serialize};

/// OData query options for collection requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ODataQuery {
    pub select: Vec<String>,
    pub expand: Vec<String>,
    pub filter: Option<String>,
    pub order_by: Vec<String>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
    /// Raw query string fragment appended last.
    pub custom: Option<String>,
    /// Chase every continuation page before completing.
    pub get_all_items: bool,
}

impl ODataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn expand<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn custom(mut self, custom: impl Into<String>) -> Self {
        self.custom = Some(custom.into());
        self
    }

    pub fn get_all_items(mut self, get_all_items: bool) -> Self {
        self.get_all_items = get_all_items;
        self
    }

    /// Render as `$select=..&$orderby=..&$top=..&$skip=..&$filter=..&$expand=..&custom`.
    pub fn query_string(&self) -> String {
        let mut values = vec![
            list_value("$select", &self.select),
            list_value("$orderby", &self.order_by),
        ];
        // Zero is treated as unset for paging options.
        if let Some(top) = self.top.filter(|top| *top > 0) {
            values.push(format!("$top={}", top));
        }
        if let Some(skip) = self.skip.filter(|skip| *skip > 0) {
            values.push(format!("$skip={}", skip));
        }
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.is_empty()) {
            values.push(format!("$filter={}", filter));
        }
        values.push(list_value("$expand", &self.expand));
        if let Some(custom) = &self.custom {
            values.push(custom.clone());
        }

        values
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn list_value(key: &str, values: &[String]) -> String {
    if values.is_empty() {
        String::new()
    } else {
        format!("{}={}", key, values.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_ordering() {
        let query = ODataQuery::new()
            .expand(["Author"])
            .filter("Title eq 'A'")
            .top(10)
            .select(["Title", "Id"])
            .order_by(["Created desc"])
            .skip(5)
            .custom("$inlinecount=allpages");

        assert_eq!(
            query.query_string(),
            "$select=Title,Id&$orderby=Created desc&$top=10&$skip=5&$filter=Title eq 'A'&$expand=Author&$inlinecount=allpages"
        );
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(ODataQuery::new().query_string(), "");
        assert_eq!(ODataQuery::new().top(0).query_string(), "");
    }

    #[test]
    fn test_deserialize_pascal_case() {
        let query: ODataQuery =
            serde_json::from_str(r#"{"Select":["Title"],"GetAllItems":true,"Top":500}"#).unwrap();

        assert!(query.get_all_items);
        assert_eq!(query.query_string(), "$select=Title&$top=500");
    }
}
