/// Settings defines the port (interface) for the key/value configuration
/// source the routing rules are read from.
///
/// Keys are dotted paths (`Routing.NewService`) and are matched
/// case-insensitively, mirroring the behaviour of the application-settings
/// stores this module is typically deployed against.
pub trait Settings: Send + Sync {
    /// Return the value for `key`, or `None` when the key is absent.
    fn get(&self, key: &str) -> Option<String>;
}
