//! Persisted key layout shared by every node on the substrate.

pub fn application_key(app: &str) -> String {
    format!("applications:{}", app)
}

pub fn application_pattern() -> &'static str {
    "applications:*"
}

pub fn ports_key(node: &str) -> String {
    format!("ports:{}", node)
}

pub fn node_applications_key(node: &str) -> String {
    format!("nodes:{}:applications", node)
}

pub fn heartbeat_key(node: &str) -> String {
    format!("heartbeat:{}", node)
}

pub fn heartbeat_pattern() -> &'static str {
    "heartbeat:*"
}

pub fn queue_key(node: &str) -> String {
    format!("queue:{}", node)
}

pub fn task_key(node: &str, task_id: &str) -> String {
    format!("queue:{}:{}", node, task_id)
}

pub fn task_pattern(node: &str) -> String {
    format!("queue:{}:*", node)
}

pub fn application_lock_key(app: &str) -> String {
    format!("lock:applications:{}", app)
}
