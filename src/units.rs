mod currency;
mod energy;
mod flow;
mod length;
mod power;
mod rate;
mod time;
mod volume;

pub use self::{
    currency::Euro,
    energy::KilowattHours,
    flow::CubicMetresPerHour,
    length::Metres,
    power::Kilowatts,
    rate::EuroPerKilowattHour,
    time::Hours,
    volume::CubicMetres,
};
