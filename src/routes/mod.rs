mod auth;
mod family;
mod food;
mod health_check;
mod users;

pub use auth::{get_current_user, login, refresh, register};
pub use family::{create, create_join, join};
pub use food::list_food;
pub use health_check::health_check;
pub use users::{delete_user, get_user, list_users};
