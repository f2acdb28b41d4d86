//! Deterministic hint and explanation texts served by the lesson server.

use kodireba_sandbox::Language;

use crate::grading::grade;
use crate::lesson::Lesson;
use crate::protocol::ExplainRequest;

/// Hint given when the lesson has nothing more specific.
pub const GENERIC_HINT: &str =
    "ყურადღებით წაიკითხე დავალება და შეამოწმე, რომ ყველა მოთხოვნილი ელემენტი დაწერე.";

/// Picks a hint for `code`.
///
/// The hint of the first failing test wins, then the first stored lesson
/// hint, then [`GENERIC_HINT`].
#[must_use]
pub fn suggest_hint(lesson: &Lesson, code: &str) -> String {
    let verdict = grade(lesson, code);
    if let Some(hint) = verdict.first_failing_hint() {
        return hint.to_string();
    }
    lesson
        .normalized_hints()
        .into_iter()
        .next()
        .unwrap_or_else(|| GENERIC_HINT.to_string())
}

/// Explains a console error in plain Georgian.
#[must_use]
pub fn explain_error(request: &ExplainRequest) -> String {
    let Some(error) = request
        .error
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    else {
        return format!(
            "შეცდომა არ მოიძებნა. გაუშვი {} კოდი და თუ კონსოლში წითელი ხაზი გამოჩნდება, ისევ მკითხე.",
            language_name(request.language)
        );
    };

    let cause = if error.contains("იტერაციების ლიმიტს") {
        "ციკლი ძალიან ბევრჯერ გაეშვა. შეამოწმე, რომ ციკლის პირობა ოდესმე მცდარი ხდება."
    } else if error.contains("is not defined") {
        "კოდი იყენებს სახელს, რომელიც არ არის გამოცხადებული. შეამოწმე მართლწერა ან გამოაცხადე ცვლადი let-ით ან const-ით."
    } else if error.contains("is not a function") {
        "ცდილობ გამოიძახო ის, რაც ფუნქცია არ არის. შეამოწმე სახელი და ფრჩხილები."
    } else if error.contains("Cannot read properties of") || error.contains("of undefined") || error.contains("of null") {
        "მნიშვნელობა undefined ან null არის და მას თვისება არ აქვს. შეამოწმე, რომ ელემენტი ან ობიექტი ნამდვილად არსებობს."
    } else if error.contains("Unexpected") || error.contains("SyntaxError") {
        "კოდში სინტაქსური შეცდომაა. მოძებნე გამოტოვებული ფრჩხილი, ბრჭყალი ან წერტილ-მძიმე."
    } else if error.contains("Assignment to constant") {
        "const-ით გამოცხადებულ ცვლადს ახალ მნიშვნელობას ვერ მიანიჭებ. გამოიყენე let."
    } else {
        "ბრაუზერმა კოდის შესრულებისას შეცდომა იპოვა. წაიკითხე შეტყობინება და შეამოწმე აღნიშნული ხაზი."
    };

    format!("შეცდომა: {error}\n\n{cause}")
}

const fn language_name(language: Language) -> &'static str {
    match language {
        Language::Html => "HTML",
        Language::Css => "CSS",
        Language::JavaScript => "JavaScript",
    }
}
