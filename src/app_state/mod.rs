/// Application state management for rs_tty_host
mod app_state;

pub use app_state::AppState;
