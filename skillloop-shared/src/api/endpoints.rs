use super::API_V1_PREFIX;

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn v1(base: &str, path: &str) -> String {
    base_join(base, &format!("{}/{}", API_V1_PREFIX, path.trim_start_matches('/')))
}

pub fn me(base: &str) -> String {
    v1(base, "users/me")
}
pub fn matches(base: &str) -> String {
    v1(base, "matches")
}
pub fn match_accept(base: &str, match_id: &str) -> String {
    v1(base, &format!("matches/{}/accept", match_id))
}
pub fn match_reject(base: &str, match_id: &str) -> String {
    v1(base, &format!("matches/{}/reject", match_id))
}
pub fn sessions(base: &str) -> String {
    v1(base, "sessions")
}
pub fn session_history(base: &str) -> String {
    v1(base, "sessions/history")
}
pub fn session(base: &str, session_id: &str) -> String {
    v1(base, &format!("sessions/{}", session_id))
}
pub fn session_complete(base: &str, session_id: &str) -> String {
    v1(base, &format!("sessions/{}/complete", session_id))
}
pub fn session_rate(base: &str, session_id: &str) -> String {
    v1(base, &format!("sessions/{}/rate", session_id))
}
pub fn credit_transactions(base: &str) -> String {
    v1(base, "credits/transactions")
}
