use docket_diff::is_internal_card;

/// Repository path of a document.
///
/// Schema documents live under `<base>/schema/<type>/<id>.json`, internal
/// records under `<base>/cards/<id>.json` and everything else under
/// `<base>/contents/<type>/<id>.json`.
pub fn filename_for(base: &[String], doc_type: &str, id: &str, is_schema: bool) -> String {
    let prefix: String = base.iter().map(|p| format!("{p}/")).collect();
    if !is_schema && is_internal_card(doc_type, id) {
        return format!("{prefix}cards/{id}.json");
    }
    let category = if is_schema { "schema" } else { "contents" };
    format!("{prefix}{category}/{doc_type}/{id}.json")
}
