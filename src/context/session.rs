/// Opaque session capability supplied by the shell.
///
/// The core only passes it through; implementations own their storage and
/// any synchronization, since concurrent requests may share one session.
pub trait Session: Send + Sync {
    fn id(&self) -> &str;
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str) -> Option<String>;
}
