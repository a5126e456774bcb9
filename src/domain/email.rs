/// One fetched message, reduced to the fields we report.
#[derive(Debug, Clone)]
pub struct Email {
    pub id: String,
    /// Gmail internalDate: millis since epoch.
    pub date: i64,
    pub body: String,
    pub subject: String,
    pub from: String,
}
