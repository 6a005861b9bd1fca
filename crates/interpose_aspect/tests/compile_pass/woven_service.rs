use interpose_aspect::{
    Advice, AdviceSet, Aspect, AspectRegistry, Marked, RegistrationError, Weave, advise, aspects,
};

#[derive(Debug, thiserror::Error)]
#[error("rejected: {0}")]
pub struct Rejected(String);

struct Noop;

impl Aspect for Noop {
    fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
        advice.add(Advice::around("pass", |_, proceed, arguments| {
            proceed.invoke(arguments)
        }))?;
        Ok(())
    }
}

struct Audit;

impl Aspect for Audit {
    fn advise(&self, advice: &mut AdviceSet<'_>) -> Result<(), RegistrationError> {
        advice.add(Advice::after("audit", |_| Ok(())))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct Service {
    base: u32,
}

#[aspects(Noop)]
impl Service {
    pub fn new(base: u32) -> Self {
        Self { base }
    }

    /// Adds to the base.
    pub fn add(&self, value: u32) -> u32 {
        self.base + value
    }

    pub fn ping(&self) {}

    pub fn copy(&self) -> Self {
        Self { base: self.base }
    }

    #[advise(Audit)]
    pub fn check(&self, name: String, _: u8) -> Result<String, Rejected> {
        if name.is_empty() {
            Err(Rejected(name))
        } else {
            Ok(name)
        }
    }
}

pub struct Plain;

#[aspects]
impl Plain {
    #[advise(Audit)]
    pub fn only_this(&self) -> u8 {
        1
    }

    pub fn untouched(&self) -> u8 {
        2
    }
}

fn main() {
    let mut builder = AspectRegistry::builder();
    builder.add_aspect(Noop).unwrap().add_aspect(Audit).unwrap();
    builder.mark_type::<Service>().mark_type::<Plain>();
    let registry = builder.finish().unwrap();

    assert_eq!(Service::markers().len(), 4);
    assert_eq!(Plain::markers().len(), 1);

    let service = Service::new(40).weave(&registry).unwrap();
    assert_eq!(service.add(2), 42);
    service.ping();
    assert_eq!(service.copy().base, 40);
    assert_eq!(service.check("ok".into(), 0).unwrap(), "ok");
    assert!(service.check(String::new(), 0).is_err());
    assert_eq!(service.inner().base, 40);

    let plain = Plain.weave(&registry).unwrap();
    assert_eq!(plain.only_this(), 1);
    assert_eq!(plain.inner().untouched(), 2);
}
