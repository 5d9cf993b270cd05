pub mod work_queue;

pub use work_queue::{PgWorkQueue, WorkQueue};
