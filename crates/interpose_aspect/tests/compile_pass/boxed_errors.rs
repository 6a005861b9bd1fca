use std::error::Error;

use interpose_aspect::{Advice, AdviceSet, Aspect, AspectRegistry, RegistrationError, Weave, aspects};

type BoxError = Box<dyn Error + Send + Sync>;

struct Guard;

impl Aspect for Guard {
    fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
        advice.add(Advice::around("guard", |_, proceed, arguments| {
            proceed.invoke(arguments)
        }))?;
        Ok(())
    }
}

pub struct Parser;

#[aspects(Guard)]
impl Parser {
    pub fn parse(&self, input: String) -> Result<u32, BoxError> {
        Ok(input.trim().parse::<u32>()?)
    }

    pub fn label(&self, input: String) -> Result<String, String> {
        if input.is_empty() {
            Err("empty label".to_string())
        } else {
            Ok(input)
        }
    }
}

fn main() {
    let mut builder = AspectRegistry::builder();
    builder.add_aspect(Guard).unwrap();
    let registry = builder.finish().unwrap();

    let parser = Parser.weave(&registry).unwrap();
    assert_eq!(parser.parse(" 42 ".into()).unwrap(), 42);
    let error = parser.parse("x".into()).unwrap_err();
    assert_eq!(error.to_string(), "invalid digit found in string");
    assert_eq!(parser.label(String::new()), Err("empty label".to_string()));
}
