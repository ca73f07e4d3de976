use calmform::form::FormModel;

#[derive(FormModel)]
struct Draft(String);

fn main() {}
