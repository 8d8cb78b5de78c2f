pub mod feedback;
pub mod session;
pub mod station;
pub mod user;

pub use feedback::Entity as Feedback;
pub use session::Entity as Session;
pub use station::Entity as Station;
pub use user::Entity as User;
