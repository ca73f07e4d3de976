use calmform::form::FormModel;

#[derive(calmform::form::FormModel)]
struct DemoForm {
    email: String,
    #[form(rename = "displayName")]
    display_name: String,
    #[form(skip)]
    draft_id: u64,
}

fn main() {
    let form = DemoForm {
        email: "a@calm.ui".to_string(),
        display_name: "A".to_string(),
        draft_id: 7,
    };
    assert_eq!(form.email, "a@calm.ui");
    assert_eq!(form.display_name, "A");
    assert_eq!(form.draft_id, 7);
    assert_eq!(DemoForm::FIELDS, &["email", "displayName"]);
}
