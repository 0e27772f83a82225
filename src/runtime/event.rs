use crate::runtime::{Runtime, RuntimeError};

///
/// A trait that defines an runtime application
/// that depends on a event set to be processed by the
/// runtime.
///
pub trait Application: Sized {
    ///
    /// The set of events used in the simulation.
    ///
    type EventSet: Event<Self>;

    ///
    /// A function that is called only once at the start of the simulation.
    ///
    /// # Examples
    ///
    /// ```
    /// # use pacesim::prelude::*;
    /// # struct Worker;
    /// # impl Worker { fn initalize(&mut self) {}}
    /// # enum MyEventSet { EventA, EventB }
    /// # impl Event<MyApp> for MyEventSet {
    /// #   fn handle(self, rt: &mut Runtime<MyApp>) {}
    /// # }
    /// struct MyApp { workers: Vec<Worker> };
    /// impl Application for MyApp {
    ///     type EventSet = MyEventSet;
    ///     fn at_sim_start(runtime: &mut Runtime<Self>) {
    ///         runtime.app.workers.iter_mut().for_each(|w| w.initalize());
    ///     }
    /// }
    /// ```
    ///
    #[allow(unused_variables)]
    fn at_sim_start(runtime: &mut Runtime<Self>) {}

    ///
    /// A function that is called once the simulation reachted its limit.
    ///
    /// # Errors
    ///
    /// This function may return an error, if some situation occured, that
    /// indicates an overall failure of the simulation. This error will be propagated
    /// to [`Runtime::run`].
    #[allow(unused_variables)]
    fn at_sim_end(runtime: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        Ok(())
    }
}

///
/// A type that can handle an event, specific to the given aplication.
///
/// Usually the event set of an application is an enum, that dispatches
/// to the handlers of its variants.
///
pub trait Event<App>
where
    App: Application,
{
    ///
    /// A function to handle an upcoming event.
    ///
    fn handle(self, runtime: &mut Runtime<App>);
}

impl<A: Application> Event<A> for () {
    fn handle(self, _: &mut Runtime<A>) {}
}
