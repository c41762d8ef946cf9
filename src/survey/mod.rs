pub mod model;
pub mod profile;
pub mod prompt;
pub mod session;

pub use model::{AgeBracket, NewResponse, SurveyResponse};
pub use profile::{Profile, StylePreferences};
pub use prompt::PromptBuilder;
pub use session::{Feedback, SessionError, Step, SurveySession};
