//! CO₂ attribution by vehicle class.
//!
//! Each class emits at a constant per-vehicle rate over the day
//! (`daily_co2 / daily_volume`); that rate is spread over the hours in
//! proportion to the class's hourly volume.

use std::array;

use tracing::warn;

use crate::analyzers::types::{
    ClassEmissions, ClassVolume, Co2Attribution, DailyTotal, Hourly, VolumeCo2Point,
};
use crate::analyzers::utility::{index_by_link, pearson};

/// Hourly CO₂ of one class: `(daily_co2 / daily_volume) * hourly_volume[h]`.
///
/// `None` when the class saw no traffic over the day.
pub fn class_hourly_co2(daily_co2: f64, volume: &ClassVolume) -> Option<Hourly> {
    if volume.daily <= 0.0 {
        return None;
    }
    let rate = daily_co2 / volume.daily;
    Some(array::from_fn(|h| rate * volume.hourly[h]))
}

/// Joins car, bus and truck volumes with the class emission totals and
/// attributes CO₂ to every hour.
///
/// Only links present in all four inputs are kept; a link where any class
/// has a zero daily volume is dropped.
pub fn attribute_co2(
    car: &[ClassVolume],
    bus: &[ClassVolume],
    truck: &[ClassVolume],
    emissions: &[ClassEmissions],
) -> Vec<Co2Attribution> {
    let bus_index = index_by_link(bus, |v| v.link_id);
    let truck_index = index_by_link(truck, |v| v.link_id);
    let co2_index = index_by_link(emissions, |e| e.link_id);

    let mut unmatched = 0usize;
    let mut no_traffic = 0usize;
    let mut attributed = Vec::with_capacity(car.len());

    for car_volume in car {
        let link_id = car_volume.link_id;
        let (Some(bus_volume), Some(truck_volume), Some(co2)) = (
            bus_index.get(&link_id),
            truck_index.get(&link_id),
            co2_index.get(&link_id),
        ) else {
            unmatched += 1;
            continue;
        };

        let classes = (
            class_hourly_co2(co2.car, car_volume),
            class_hourly_co2(co2.bus, bus_volume),
            class_hourly_co2(co2.truck, truck_volume),
        );
        let (Some(car_co2), Some(bus_co2), Some(truck_co2)) = classes else {
            no_traffic += 1;
            continue;
        };

        attributed.push(Co2Attribution {
            link_id,
            car: car_co2,
            bus: bus_co2,
            truck: truck_co2,
            total: array::from_fn(|h| car_co2[h] + bus_co2[h] + truck_co2[h]),
        });
    }

    if unmatched > 0 {
        warn!(unmatched, "Links missing from a volume or CO2 table excluded");
    }
    if no_traffic > 0 {
        warn!(no_traffic, "Links with a zero daily class volume excluded");
    }

    attributed
}

/// Pairs each link's daily volume with its daily CO₂ and correlates them.
pub fn volume_co2_correlation(
    volumes: &[DailyTotal],
    emissions: &[DailyTotal],
) -> (Vec<VolumeCo2Point>, Option<f64>) {
    let co2_index = index_by_link(emissions, |e| e.link_id);

    let points: Vec<VolumeCo2Point> = volumes
        .iter()
        .filter_map(|volume| {
            let co2 = co2_index.get(&volume.link_id)?;
            Some(VolumeCo2Point {
                link_id: volume.link_id,
                total_volume: volume.value,
                co2_emissions: co2.value,
            })
        })
        .collect();

    let xs: Vec<f64> = points.iter().map(|p| p.total_volume).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.co2_emissions).collect();

    let correlation = pearson(&xs, &ys);
    (points, correlation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::HOURS;
    use approx::assert_relative_eq;

    fn volume(link_id: i64, daily: f64, hourly: f64) -> ClassVolume {
        ClassVolume {
            link_id,
            daily,
            hourly: [hourly; HOURS],
        }
    }

    fn emissions(link_id: i64) -> ClassEmissions {
        ClassEmissions {
            link_id,
            car: 100.0,
            bus: 48.0,
            truck: 30.0,
        }
    }

    #[test]
    fn test_class_hourly_co2_uses_daily_rate() {
        let hourly = class_hourly_co2(100.0, &volume(1, 10.0, 2.0)).unwrap();
        assert_eq!(hourly, [20.0; HOURS]);
    }

    #[test]
    fn test_class_hourly_co2_zero_volume() {
        assert_eq!(class_hourly_co2(100.0, &volume(1, 0.0, 0.0)), None);
    }

    #[test]
    fn test_total_is_sum_of_classes() {
        let mut car = volume(1, 240.0, 10.0);
        car.hourly[8] = 25.0;
        let attributed = attribute_co2(
            &[car],
            &[volume(1, 24.0, 1.0)],
            &[volume(1, 12.0, 0.5)],
            &[emissions(1)],
        );

        let link = &attributed[0];
        for h in 0..HOURS {
            assert_eq!(link.total[h], link.car[h] + link.bus[h] + link.truck[h]);
        }
        assert_relative_eq!(link.bus[0], 2.0);
        assert_relative_eq!(link.truck[0], 1.25);
        assert_relative_eq!(link.car[8], 100.0 / 240.0 * 25.0);
    }

    #[test]
    fn test_links_missing_a_class_or_traffic_are_dropped() {
        let car = [volume(1, 10.0, 1.0), volume(2, 10.0, 1.0), volume(3, 10.0, 1.0)];
        let bus = [volume(1, 10.0, 1.0), volume(2, 0.0, 0.0), volume(3, 10.0, 1.0)];
        let truck = [volume(1, 10.0, 1.0), volume(2, 10.0, 1.0), volume(3, 10.0, 1.0)];
        let co2 = [emissions(1), emissions(2)];

        let attributed = attribute_co2(&car, &bus, &truck, &co2);
        assert_eq!(attributed.len(), 1);
        assert_eq!(attributed[0].link_id, 1);
    }

    #[test]
    fn test_volume_co2_correlation_joins_by_link() {
        let volumes = [
            DailyTotal { link_id: 1, value: 100.0 },
            DailyTotal { link_id: 2, value: 200.0 },
            DailyTotal { link_id: 3, value: 300.0 },
            DailyTotal { link_id: 4, value: 999.0 },
        ];
        let co2 = [
            DailyTotal { link_id: 3, value: 30.0 },
            DailyTotal { link_id: 1, value: 10.0 },
            DailyTotal { link_id: 2, value: 20.0 },
        ];

        let (points, correlation) = volume_co2_correlation(&volumes, &co2);
        assert_eq!(points.len(), 3);
        assert_eq!(points[2].co2_emissions, 30.0);
        assert_relative_eq!(correlation.unwrap(), 1.0, epsilon = 1e-12);
    }
}
