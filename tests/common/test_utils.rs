use std::{fs, path::PathBuf};

/// Structure to manage temporary test databases that are automatically cleaned up
pub struct TestDb {
    path: PathBuf,
}

impl TestDb {
    /// Create a new test database path with a name based on the test name
    pub fn new(test_name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "bbf_test_{}_{}.redb",
            test_name,
            rand::random::<u64>()
        ));
        Self { path }
    }

    /// Get a clone of the database path
    #[allow(dead_code)]
    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }

    /// Get the database path as a string
    #[allow(dead_code)]
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}
